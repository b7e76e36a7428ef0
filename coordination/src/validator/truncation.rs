//! Truncation signatures on the last meaningful line.

use std::sync::LazyLock;

use regex::Regex;

use super::kind::ArtifactKind;

struct Signature {
    pattern: Regex,
    message: &'static str,
}

fn sig(pattern: &str, message: &'static str) -> Signature {
    Signature {
        pattern: Regex::new(pattern).unwrap(),
        message,
    }
}

static PYTHON: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        sig(r"\.\.\.$", "Code ends with '...' - likely truncated"),
        sig(r"^\s*(async\s+)?def\s+\w+\s*\([^)]*$", "Function definition is incomplete"),
        sig(r"^\s*class\s+\w+[^:]*$", "Class definition is incomplete"),
        sig(r"^\s*(if|elif|while|for|with)\s+[^:]+$", "Control statement header is incomplete"),
        sig(r":\s*$", "Code ends with a colon but no body"),
        sig(r"[(\[{,\\]\s*$", "Code ends with an unfinished expression"),
    ]
});

static SCRIPT: LazyLock<Vec<Signature>> = LazyLock::new(|| {
    vec![
        sig(
            r"\breturn\s*\($",
            "Incomplete return statement: `return (` is never closed",
        ),
        sig(r"<\w+\s+[\w-]+=$", "JSX attribute is incomplete"),
        sig(r"<[A-Za-z][\w.]*$", "JSX opening tag is incomplete"),
        sig(r"=>\s*$", "Arrow function has no body"),
        sig(r"\{\s*$", "Unclosed block or expression at end of file"),
        sig(r"\.\.\.$", "Code ends with '...' - likely truncated"),
        sig(r"[(\[,]\s*$", "Code ends with an unfinished expression"),
    ]
});

static PYTHON_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#\s*\.\.\.").unwrap());

static TRIPLE_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"("""|''')\s*$"#).unwrap());

/// Last line that is not blank.
pub(crate) fn last_meaningful_line(content: &str) -> Option<&str> {
    content.lines().rev().map(str::trim_end).find(|l| !l.trim().is_empty())
}

/// `line` without a trailing `#` comment. Quotes are tracked so `'#'` survives.
fn strip_python_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => return line[..i].trim_end(),
            None => {}
        }
    }
    line
}

/// First truncation signature matching the last meaningful line.
pub(crate) fn check(kind: ArtifactKind, content: &str) -> Option<String> {
    let last = last_meaningful_line(content)?;
    let signatures = match kind {
        ArtifactKind::Python => {
            // A closing `"""` on the last line is fine; an odd count means it opened one.
            if TRIPLE_QUOTE.is_match(last)
                && (content.matches("\"\"\"").count() % 2 == 1
                    || content.matches("'''").count() % 2 == 1)
            {
                return Some("Ends inside an unclosed triple-quoted string".to_string());
            }
            if PYTHON_PLACEHOLDER.is_match(last) {
                return Some("Ends with a '# ...' placeholder - likely truncated".to_string());
            }
            let code = strip_python_comment(last);
            return PYTHON
                .iter()
                .find(|s| !code.is_empty() && s.pattern.is_match(code))
                .map(|s| s.message.to_string());
        }
        ArtifactKind::Component | ArtifactKind::Script => &*SCRIPT,
        _ => return None,
    };

    signatures
        .iter()
        .find(|s| s.pattern.is_match(last))
        .map(|s| s.message.to_string())
}

/// Block comment opened after the last close, for kinds the strict lexer skips.
pub(crate) fn open_block_comment(content: &str) -> bool {
    match (content.rfind("/*"), content.rfind("*/")) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}
