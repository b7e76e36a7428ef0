use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::parse_reply;
use crate::generation::{GenerationRequest, Role, TextGenerator};
use crate::prompts;

/// What the user wants built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectScope {
    pub project_goal: String,
    pub target_users: String,
    pub core_features: Vec<String>,
    pub technical_constraints: Vec<String>,
}

impl Default for ProjectScope {
    fn default() -> Self {
        Self {
            project_goal: "A web application".to_string(),
            target_users: "General users".to_string(),
            core_features: vec!["Basic functionality".to_string()],
            technical_constraints: Vec::new(),
        }
    }
}

impl ProjectScope {
    /// Scope used when the model reply is unusable: the request itself is the goal.
    pub fn from_request(request: &str) -> Self {
        let goal = request.trim();
        Self {
            project_goal: if goal.is_empty() {
                Self::default().project_goal
            } else {
                goal.to_string()
            },
            ..Self::default()
        }
    }

    fn normalized(mut self, request: &str) -> Self {
        if self.project_goal.trim().is_empty() {
            self.project_goal = Self::from_request(request).project_goal;
        }
        self.core_features.retain(|f| !f.trim().is_empty());
        if self.core_features.is_empty() {
            self.core_features = Self::default().core_features;
        }
        self
    }
}

/// Analyze the request. Never fails; an unusable reply yields [`ProjectScope::from_request`].
pub async fn strategize(generator: &dyn TextGenerator, request: &str) -> ProjectScope {
    let req = GenerationRequest::new(
        Role::Strategist,
        prompts::STRATEGIST_PREAMBLE,
        prompts::strategist_prompt(request),
    );

    let scope = match generator.invoke(&req).await {
        Ok(raw) => match parse_reply::<ProjectScope>(&raw) {
            Ok(scope) => scope.normalized(request),
            Err(e) => {
                warn!(error = %e, "Strategist reply unparseable, using request as goal");
                ProjectScope::from_request(request)
            }
        },
        Err(e) => {
            warn!(error = %e, "Strategist invocation failed, using request as goal");
            ProjectScope::from_request(request)
        }
    };

    info!(
        goal = %scope.project_goal,
        features = scope.core_features.len(),
        "Scope defined"
    );
    scope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let scope: ProjectScope =
            parse_reply(r#"{"project_goal": "Track books", "core_features": ["Add book"]}"#)
                .unwrap();
        assert_eq!(scope.target_users, "General users");
        assert_eq!(scope.core_features, vec!["Add book"]);
    }

    #[test]
    fn test_normalized_fills_blank_goal_and_features() {
        let scope = ProjectScope {
            project_goal: "  ".into(),
            core_features: vec!["".into()],
            ..ProjectScope::default()
        }
        .normalized("todo app");
        assert_eq!(scope.project_goal, "todo app");
        assert_eq!(scope.core_features, vec!["Basic functionality"]);
    }

    #[test]
    fn test_from_empty_request() {
        assert_eq!(ProjectScope::from_request("").project_goal, "A web application");
    }
}
