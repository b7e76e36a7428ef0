//! Pipeline State Machine: explicit stages and legal transition guards.
//!
//! Every run starts at `Strategizing` and ends at `Terminated`. The
//! orchestrator calls `advance()` to move between stages; each call checks
//! the edge against the transition table and appends to the transition log,
//! which ends up in the run report.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Turning the request into a project scope.
    Strategizing,
    /// Choosing backend/frontend stacks.
    Architecting,
    /// Deriving the ordered file plan.
    Planning,
    /// Producing artifacts (full plan, or targeted after a repair).
    Generating,
    /// Persisting artifacts and the contract.
    Writing,
    /// Booting the backend and running the contract.
    Verifying,
    /// Selecting repair targets and regenerating them.
    Repairing,
    /// Terminal: passed, budget exhausted, or aborted.
    Terminated,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strategizing => write!(f, "Strategizing"),
            Self::Architecting => write!(f, "Architecting"),
            Self::Planning => write!(f, "Planning"),
            Self::Generating => write!(f, "Generating"),
            Self::Writing => write!(f, "Writing"),
            Self::Verifying => write!(f, "Verifying"),
            Self::Repairing => write!(f, "Repairing"),
            Self::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Legal edges:
/// ```text
/// Strategizing → Architecting
/// Architecting → Planning
/// Planning → Generating
/// Generating → Writing
/// Writing → Verifying
/// Verifying → Repairing | Terminated
/// Repairing → Generating
/// ```
/// Any non-terminal state may also abort to `Terminated`.
fn is_legal_transition(from: PipelineState, to: PipelineState) -> bool {
    use PipelineState::*;

    if to == Terminated && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Strategizing, Architecting)
            | (Architecting, Planning)
            | (Planning, Generating)
            | (Generating, Writing)
            | (Writing, Verifying)
            | (Verifying, Repairing)
            | (Repairing, Generating)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelineState,
    pub to: PipelineState,
    /// Repair cycle at the time of transition (0 before the first repair).
    pub cycle: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

pub struct StateMachine {
    current: PipelineState,
    cycle: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Strategizing,
            cycle: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn set_cycle(&mut self, cycle: u32) {
        self.cycle = cycle;
    }

    /// Move to `to` if the edge is legal, recording why.
    pub fn advance(
        &mut self,
        to: PipelineState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            cycle: self.cycle,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::info!(
            from = %self.current,
            to = %to,
            cycle = self.cycle,
            reason = reason.unwrap_or(""),
            "State transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Abort to `Terminated`. Legal from any non-terminal state.
    pub fn abort(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(PipelineState::Terminated, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Number of times `state` was entered.
    pub fn entries(&self, state: PipelineState) -> usize {
        self.transitions.iter().filter(|t| t.to == state).count()
    }

    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut out = format!(
            "{} → {} ({}ms, {} transitions)",
            PipelineState::Strategizing,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !states.is_empty() {
            out.push_str(&format!(" [{}]", states.join(" → ")));
        }
        out
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_verifying(sm: &mut StateMachine) {
        sm.advance(PipelineState::Architecting, None).unwrap();
        sm.advance(PipelineState::Planning, None).unwrap();
        sm.advance(PipelineState::Generating, None).unwrap();
        sm.advance(PipelineState::Writing, None).unwrap();
        sm.advance(PipelineState::Verifying, None).unwrap();
    }

    #[test]
    fn test_initial_state() {
        let sm = StateMachine::new();
        assert_eq!(sm.current(), PipelineState::Strategizing);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_happy_path() {
        let mut sm = StateMachine::new();
        to_verifying(&mut sm);
        sm.advance(PipelineState::Terminated, Some("contract passed"))
            .unwrap();
        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 6);
    }

    #[test]
    fn test_repair_loop() {
        let mut sm = StateMachine::new();
        to_verifying(&mut sm);
        for cycle in 1..=3 {
            sm.advance(PipelineState::Repairing, Some("contract failed"))
                .unwrap();
            sm.set_cycle(cycle);
            sm.advance(PipelineState::Generating, Some("targeted")).unwrap();
            sm.advance(PipelineState::Writing, None).unwrap();
            sm.advance(PipelineState::Verifying, None).unwrap();
        }
        sm.advance(PipelineState::Terminated, Some("budget exhausted"))
            .unwrap();

        assert_eq!(sm.entries(PipelineState::Repairing), 3);
        assert_eq!(sm.entries(PipelineState::Verifying), 4);
        assert_eq!(sm.transitions().last().unwrap().cycle, 3);
    }

    #[test]
    fn test_abort_from_any_state() {
        for state in [
            PipelineState::Strategizing,
            PipelineState::Architecting,
            PipelineState::Planning,
            PipelineState::Generating,
            PipelineState::Writing,
            PipelineState::Verifying,
            PipelineState::Repairing,
        ] {
            let mut sm = StateMachine {
                current: state,
                cycle: 0,
                created_at: Instant::now(),
                transitions: Vec::new(),
            };
            assert!(sm.abort("infrastructure error").is_ok());
            assert!(sm.is_terminal());
        }
    }

    #[test]
    fn test_cannot_leave_terminal() {
        let mut sm = StateMachine::new();
        sm.abort("stop").unwrap();
        let err = sm.advance(PipelineState::Generating, None).unwrap_err();
        assert_eq!(err.from, PipelineState::Terminated);
        assert!(sm.abort("again").is_err());
    }

    #[test]
    fn test_illegal_edges() {
        let mut sm = StateMachine::new();
        assert!(sm.advance(PipelineState::Generating, None).is_err());

        to_verifying(&mut sm);
        // Verify never goes straight back to Generate.
        assert!(sm.advance(PipelineState::Generating, None).is_err());
        sm.advance(PipelineState::Repairing, None).unwrap();
        // Repair must regenerate before verifying again.
        assert!(sm.advance(PipelineState::Verifying, None).is_err());
    }

    #[test]
    fn test_transition_record_has_reason_and_roundtrips() {
        let mut sm = StateMachine::new();
        sm.advance(PipelineState::Architecting, Some("scope ready"))
            .unwrap();
        let record = &sm.transitions()[0];
        assert_eq!(record.reason.as_deref(), Some("scope ready"));

        let json = serde_json::to_string(record).unwrap();
        let restored: TransitionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.from, PipelineState::Strategizing);
        assert_eq!(restored.to, PipelineState::Architecting);
    }

    #[test]
    fn test_summary() {
        let mut sm = StateMachine::new();
        sm.advance(PipelineState::Architecting, None).unwrap();
        sm.abort("test").unwrap();
        let summary = sm.summary();
        assert!(summary.contains("Terminated"));
        assert!(summary.contains("2 transitions"));
    }
}
