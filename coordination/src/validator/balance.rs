//! Bracket balance scanning.
//!
//! Two modes: a lexer-aware stack match with zero tolerance for Python,
//! scripts and stylesheets, and raw open/close counting with slack for
//! template-language components, where markup text makes a precise lexer
//! more trouble than it is worth.

/// Comment and string conventions for the strict scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexicon {
    /// `#` line comments, `'`/`"` and triple-quoted strings.
    Hash,
    /// `//` and `/* */` comments, `'`/`"` strings, backtick templates.
    Slash,
    /// `/* */` comments and `'`/`"` strings only (CSS).
    BlockOnly,
}

/// What was still open when the input ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unterminated {
    String,
    TripleString,
    Template,
    BlockComment,
}

impl Unterminated {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::String => "Unterminated string literal at end of file",
            Self::TripleString => "Unclosed triple-quoted string at end of file",
            Self::Template => "Unterminated template literal at end of file",
            Self::BlockComment => "Unterminated block comment at end of file",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub issues: Vec<String>,
    pub unterminated: Option<Unterminated>,
}

const MAX_ISSUES: usize = 5;

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Triple(char),
    Template,
}

/// Stack-match brackets outside strings and comments.
pub(crate) fn scan_strict(content: &str, lexicon: Lexicon) -> Scan {
    let chars: Vec<char> = content.chars().collect();
    let mut scan = Scan::default();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut mode = Mode::Code;
    let mut line = 1usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c == '\n' {
            line += 1;
        }

        match mode {
            Mode::Code => match c {
                '#' if lexicon == Lexicon::Hash => mode = Mode::LineComment,
                '/' if lexicon == Lexicon::Slash && next == Some('/') => {
                    mode = Mode::LineComment;
                    i += 1;
                }
                '/' if lexicon != Lexicon::Hash && next == Some('*') => {
                    mode = Mode::BlockComment;
                    i += 1;
                }
                '`' if lexicon == Lexicon::Slash => mode = Mode::Template,
                '\'' | '"' => {
                    if lexicon == Lexicon::Hash
                        && next == Some(c)
                        && chars.get(i + 2).copied() == Some(c)
                    {
                        mode = Mode::Triple(c);
                        i += 2;
                    } else {
                        mode = Mode::Str(c);
                    }
                }
                '(' | '[' | '{' => stack.push((c, line)),
                ')' | ']' | '}' => match stack.pop() {
                    Some((open, _)) if closer(open) == c => {}
                    Some((open, open_line)) => {
                        if scan.issues.len() < MAX_ISSUES {
                            scan.issues.push(format!(
                                "Mismatched brackets: '{open}' opened at line {open_line} closed by '{c}' at line {line}"
                            ));
                        }
                    }
                    None => {
                        if scan.issues.len() < MAX_ISSUES {
                            scan.issues
                                .push(format!("Unmatched closing '{c}' at line {line}"));
                        }
                    }
                },
                _ => {}
            },
            Mode::LineComment => {
                if c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    mode = Mode::Code;
                    i += 1;
                }
            }
            Mode::Str(q) => {
                if c == '\\' {
                    if next == Some('\n') {
                        line += 1;
                    }
                    i += 1;
                } else if c == q || c == '\n' {
                    mode = Mode::Code;
                }
            }
            Mode::Triple(q) => {
                if c == '\\' {
                    if next == Some('\n') {
                        line += 1;
                    }
                    i += 1;
                } else if c == q && next == Some(q) && chars.get(i + 2).copied() == Some(q) {
                    mode = Mode::Code;
                    i += 2;
                }
            }
            Mode::Template => {
                if c == '\\' {
                    if next == Some('\n') {
                        line += 1;
                    }
                    i += 1;
                } else if c == '`' {
                    mode = Mode::Code;
                }
            }
        }
        i += 1;
    }

    scan.unterminated = match mode {
        Mode::Str(_) => Some(Unterminated::String),
        Mode::Triple(_) => Some(Unterminated::TripleString),
        Mode::Template => Some(Unterminated::Template),
        Mode::BlockComment => Some(Unterminated::BlockComment),
        Mode::Code | Mode::LineComment => None,
    };

    if !stack.is_empty() && scan.issues.len() < MAX_ISSUES {
        let open: Vec<String> = stack
            .iter()
            .map(|(c, l)| format!("'{c}' (line {l})"))
            .collect();
        scan.issues
            .push(format!("Unclosed brackets: {}", open.join(", ")));
    }

    scan
}

/// Compare raw open/close counts; report pairs whose difference exceeds `slack`.
pub(crate) fn scan_counts(content: &str, slack: usize) -> Vec<String> {
    let count = |c: char| content.chars().filter(|&x| x == c).count();
    [("braces", '{', '}'), ("parentheses", '(', ')'), ("brackets", '[', ']')]
        .into_iter()
        .filter_map(|(name, open, close)| {
            let (o, c) = (count(open), count(close));
            (o.abs_diff(c) > slack).then(|| format!("Unbalanced {name}: {o} open, {c} close"))
        })
        .collect()
}
