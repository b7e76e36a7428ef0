//! Parser-backed syntax checks.
//!
//! Python goes through tree-sitter-python, script and component kinds
//! through the TSX grammar (a superset of JS + JSX), JSON through serde_json.

use tree_sitter::{Language, Node, Parser};

use super::kind::ArtifactKind;

/// First syntax error found in an artifact. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Syntax error at line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

fn language(kind: ArtifactKind) -> Option<Language> {
    match kind {
        ArtifactKind::Python => Some(tree_sitter_python::LANGUAGE.into()),
        ArtifactKind::Component | ArtifactKind::Script => {
            Some(tree_sitter_typescript::LANGUAGE_TSX.into())
        }
        _ => None,
    }
}

/// Parse `content` as `kind` and return the first error, if any.
///
/// Kinds without a parser always return `None`.
pub fn check(kind: ArtifactKind, content: &str) -> Option<SyntaxError> {
    if kind == ArtifactKind::Json {
        return serde_json::from_str::<serde_json::Value>(content)
            .err()
            .map(|e| SyntaxError {
                line: e.line(),
                column: e.column(),
                message: format!("invalid JSON ({e})"),
            });
    }

    let language = language(kind)?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language) {
        tracing::warn!(%kind, error = %e, "tree-sitter grammar unavailable, skipping parse");
        return None;
    }

    let tree = parser.parse(content, None)?;
    let root = tree.root_node();
    if !root.has_error() {
        return None;
    }

    let node = first_error(root).unwrap_or(root);
    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let snippet = node
            .utf8_text(content.as_bytes())
            .ok()
            .and_then(|t| t.lines().next())
            .map(|l| l.trim().chars().take(40).collect::<String>())
            .unwrap_or_default();
        if snippet.is_empty() {
            "unexpected end of input".to_string()
        } else {
            format!("unexpected `{snippet}`")
        }
    };

    Some(SyntaxError {
        line: pos.row + 1,
        column: pos.column + 1,
        message,
    })
}

/// Pre-order search for the first ERROR or MISSING node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}
