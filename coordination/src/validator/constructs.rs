//! Role-specific constructs an artifact must contain.

use std::sync::LazyLock;

use regex::Regex;

use super::kind::ArtifactRole;

type Requirement = (Regex, &'static str);

fn req(pattern: &str, message: &'static str) -> Requirement {
    (Regex::new(pattern).unwrap(), message)
}

static FLASK: LazyLock<Vec<Requirement>> = LazyLock::new(|| {
    vec![
        req(r"(?m)^\s*(from\s+flask\s+import|import\s+flask\b)", "Missing Flask import"),
        req(r"\b\w+\s*=\s*Flask\s*\(", "Missing Flask app initialization"),
        req(
            r"(?m)^\s*(from\s+flask_cors\s+import\s+[^\n]*\bCORS\b|import\s+flask_cors\b)",
            "Missing CORS import",
        ),
        req(r"\bCORS\s*\(\s*\w+", "Missing CORS initialization"),
        req(
            r"@\w+\.(route|get|post|put|patch|delete)\s*\(",
            "No routes defined",
        ),
        req(
            r#"if\s+__name__\s*==\s*['"]__main__['"]\s*:"#,
            "Missing if __name__ == '__main__' guard",
        ),
        req(r"\.run\s*\(", "Missing app.run() call"),
    ]
});

static EXPRESS: LazyLock<Vec<Requirement>> = LazyLock::new(|| {
    vec![
        req(
            r#"require\(\s*['"]express['"]\s*\)|from\s+['"]express['"]"#,
            "Missing express import",
        ),
        req(r"\.listen\s*\(", "Missing app.listen() call"),
        req(
            r#"\b\w+\.(get|post|put|patch|delete|all)\s*\(\s*['"`]/"#,
            "No routes defined",
        ),
        req(r"\bcors\s*\(", "Missing CORS middleware"),
    ]
});

static ROOT_COMPONENT: LazyLock<Vec<Requirement>> = LazyLock::new(|| {
    vec![
        req(r"(?m)^\s*import\s+React\b", "Missing React import"),
        req(r"\bexport\s+default\b", "Missing export default"),
    ]
});

/// Messages for every requirement `content` fails for `role`.
pub(crate) fn missing(role: ArtifactRole, content: &str) -> Vec<String> {
    let requirements: &[Requirement] = match role {
        ArtifactRole::FlaskBackend => &FLASK,
        ArtifactRole::ExpressBackend => &EXPRESS,
        ArtifactRole::RootComponent => &ROOT_COMPONENT,
        ArtifactRole::Module => return Vec::new(),
    };
    requirements
        .iter()
        .filter(|(re, _)| !re.is_match(content))
        .map(|(_, msg)| msg.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLASK_NO_CORS: &str = r#"from flask import Flask, jsonify

app = Flask(__name__)

@app.route('/health')
def health():
    return jsonify({"ok": True})

if __name__ == '__main__':
    app.run(port=5000)
"#;

    #[test]
    fn test_flask_without_cors() {
        let issues = missing(ArtifactRole::FlaskBackend, FLASK_NO_CORS);
        assert_eq!(
            issues,
            vec!["Missing CORS import".to_string(), "Missing CORS initialization".to_string()]
        );
    }

    #[test]
    fn test_component_requirements() {
        let issues = missing(ArtifactRole::RootComponent, "function App() { return null; }");
        assert!(issues.contains(&"Missing React import".to_string()));
        assert!(issues.contains(&"Missing export default".to_string()));
    }

    #[test]
    fn test_express_complete() {
        let src = "const express = require('express');\nconst cors = require('cors');\nconst app = express();\napp.use(cors());\napp.get('/items', (req, res) => res.json([]));\napp.listen(5000);\n";
        assert!(missing(ArtifactRole::ExpressBackend, src).is_empty());
    }

    #[test]
    fn test_plain_module_has_no_requirements() {
        assert!(missing(ArtifactRole::Module, "").is_empty());
    }
}
