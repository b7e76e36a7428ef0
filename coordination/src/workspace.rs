//! Run directories and artifact persistence.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoordinationError, CoordinationResult};

const SLUG_MAX: usize = 50;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_-]+").unwrap());

/// A validated workspace-relative artifact path.
///
/// Non-empty, relative, and free of `..` segments, so joining it onto a
/// workspace root can never escape that root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactPath(String);

impl ArtifactPath {
    pub fn new(path: impl Into<String>) -> CoordinationResult<Self> {
        let path = path.into();
        let invalid = |reason: &str| CoordinationError::InvalidArtifactPath {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if path.trim().is_empty() {
            return Err(invalid("empty path"));
        }
        if path.starts_with('/') || path.starts_with('\\') || Path::new(&path).is_absolute() {
            return Err(invalid("absolute paths are not allowed"));
        }
        for component in Path::new(&path).components() {
            match component {
                Component::ParentDir => return Err(invalid("`..` segments are not allowed")),
                Component::Prefix(_) | Component::RootDir => {
                    return Err(invalid("absolute paths are not allowed"))
                }
                _ => {}
            }
        }
        if path.split(['/', '\\']).any(|seg| seg == "..") {
            return Err(invalid("`..` segments are not allowed"));
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl TryFrom<String> for ArtifactPath {
    type Error = CoordinationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactPath> for String {
    fn from(value: ArtifactPath) -> Self {
        value.0
    }
}

impl std::fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write every artifact under `root`, creating parent directories.
///
/// Files whose bytes already match are left untouched, so writing the
/// same set twice is a no-op. Returns the number of files actually written.
pub fn write_artifacts(root: &Path, files: &BTreeMap<String, String>) -> CoordinationResult<usize> {
    let mut written = 0;
    for (path, content) in files {
        let artifact = ArtifactPath::new(path.as_str())?;
        let dest = artifact.resolve(root);
        if std::fs::read(&dest).is_ok_and(|existing| existing == content.as_bytes()) {
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoordinationError::io(parent, e))?;
        }
        std::fs::write(&dest, content).map_err(|e| CoordinationError::io(&dest, e))?;
        written += 1;
    }
    tracing::info!(root = %root.display(), total = files.len(), written, "artifacts written");
    Ok(written)
}

/// Filesystem-safe slug for a request: lowercase, word characters only,
/// separator runs collapsed to `_`, at most 50 chars, `project` if empty.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(lower.trim(), "");
    let collapsed = SEPARATORS.replace_all(&cleaned, "_");
    let slug: String = collapsed.trim_matches('_').chars().take(SLUG_MAX).collect();
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

/// Create `<root>/<slug>_<YYYYmmdd_HHMMSS>` with `backend/` and `frontend/`.
pub fn create_run_dir(root: &Path, request: &str, now: DateTime<Local>) -> CoordinationResult<PathBuf> {
    let name = format!("{}_{}", slugify(request), now.format("%Y%m%d_%H%M%S"));
    let dir = root.join(name);
    for sub in ["backend", "frontend"] {
        let path = dir.join(sub);
        std::fs::create_dir_all(&path).map_err(|e| CoordinationError::io(&path, e))?;
    }
    tracing::info!(dir = %dir.display(), "run directory created");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_path_rejections() {
        assert!(ArtifactPath::new("").is_err());
        assert!(ArtifactPath::new("   ").is_err());
        assert!(ArtifactPath::new("/etc/passwd").is_err());
        assert!(ArtifactPath::new("backend/../../x").is_err());
        assert!(ArtifactPath::new("..").is_err());
        assert!(ArtifactPath::new("backend/app.py").is_ok());
        assert!(ArtifactPath::new("./frontend/src/App.jsx").is_ok());
    }

    #[test]
    fn test_artifact_path_serde_validates() {
        let ok: ArtifactPath = serde_json::from_str("\"backend/app.py\"").unwrap();
        assert_eq!(ok.as_str(), "backend/app.py");
        assert!(serde_json::from_str::<ArtifactPath>("\"../x\"").is_err());
    }

    #[test]
    fn test_write_artifacts_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = BTreeMap::new();
        files.insert("backend/app.py".to_string(), "print('hi')\n".to_string());
        files.insert("frontend/src/App.jsx".to_string(), "export default 1;\n".to_string());

        assert_eq!(write_artifacts(dir.path(), &files).unwrap(), 2);
        let first = std::fs::read(dir.path().join("backend/app.py")).unwrap();
        assert_eq!(write_artifacts(dir.path(), &files).unwrap(), 0);
        let second = std::fs::read(dir.path().join("backend/app.py")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = BTreeMap::new();
        files.insert("../escape.txt".to_string(), "x".to_string());
        assert!(matches!(
            write_artifacts(dir.path(), &files),
            Err(CoordinationError::InvalidArtifactPath { .. })
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Build a Todo App!"), "build_a_todo_app");
        assert_eq!(slugify("  multi---dash__and   space "), "multi_dash_and_space");
        assert_eq!(slugify("!!!"), "project");
        assert_eq!(slugify(&"a".repeat(80)).len(), 50);
    }

    #[test]
    fn test_create_run_dir_layout() {
        let root = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let dir = create_run_dir(root.path(), "Todo list", now).unwrap();
        assert!(dir.ends_with("todo_list_20240102_030405"));
        assert!(dir.join("backend").is_dir());
        assert!(dir.join("frontend").is_dir());
    }
}
