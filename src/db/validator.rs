//! Statement-text guardrail applied to every candidate before it reaches the database.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(insert|update|delete|drop|alter|create|truncate|merge|attach|detach|copy|install|pragma|grant|revoke|vacuum|checkpoint)\b",
    )
    .expect("forbidden keyword pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafeQuery {
    Empty,
    MultipleStatements,
    ForbiddenKeyword(String),
    NotASelect(String),
    UnterminatedLiteral,
}

impl fmt::Display for UnsafeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeQuery::Empty => write!(f, "Cannot run that query: the statement is empty"),
            UnsafeQuery::MultipleStatements => write!(
                f,
                "Cannot run that query: only a single statement is allowed"
            ),
            UnsafeQuery::ForbiddenKeyword(kw) => write!(
                f,
                "Cannot run that query: `{}` statements are not allowed, queries must be read-only",
                kw
            ),
            UnsafeQuery::NotASelect(kw) => write!(
                f,
                "Cannot run that query: only SELECT or WITH ... SELECT statements are allowed (found `{}`)",
                kw
            ),
            UnsafeQuery::UnterminatedLiteral => write!(
                f,
                "Cannot run that query: unterminated string, identifier or comment"
            ),
        }
    }
}

impl std::error::Error for UnsafeQuery {}

/// Accepts exactly one read-only statement and returns it without the trailing separator.
pub fn validate_read_only(raw_sql: &str) -> Result<String, UnsafeQuery> {
    let masked = mask_literals(raw_sql)?;

    let trimmed = masked.trim();
    let mut body_end = trimmed.len();
    while trimmed[..body_end].trim_end().ends_with(';') {
        body_end = trimmed[..body_end].trim_end().len() - 1;
    }
    let body = trimmed[..body_end].trim();

    if body.is_empty() {
        return Err(UnsafeQuery::Empty);
    }
    if body.contains(';') {
        return Err(UnsafeQuery::MultipleStatements);
    }
    if let Some(found) = FORBIDDEN_KEYWORD.find(body) {
        return Err(UnsafeQuery::ForbiddenKeyword(found.as_str().to_uppercase()));
    }

    let leading = body
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .find(|token| !token.is_empty())
        .unwrap_or("")
        .to_lowercase();
    if leading != "select" && leading != "with" {
        return Err(UnsafeQuery::NotASelect(leading.to_uppercase()));
    }

    // Masking is byte-for-byte, so the same range of the original is the statement.
    let start = masked.len() - masked.trim_start().len();
    Ok(raw_sql[start..start + body.len()].to_string())
}

/// Replaces the contents of string literals, quoted identifiers and comments with
/// spaces so keyword and separator checks only see statement structure.
fn mask_literals(sql: &str) -> Result<String, UnsafeQuery> {
    let bytes = sql.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                out.push(quote);
                i += 1;
                loop {
                    if i >= bytes.len() {
                        return Err(UnsafeQuery::UnterminatedLiteral);
                    }
                    if bytes[i] == quote {
                        // doubled quote is an escaped quote
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            out.extend_from_slice(b"  ");
                            i += 2;
                            continue;
                        }
                        out.push(quote);
                        i += 1;
                        break;
                    }
                    out.push(if bytes[i].is_ascii() { b' ' } else { bytes[i] });
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.extend_from_slice(b"  ");
                i += 2;
                loop {
                    if i + 1 >= bytes.len() {
                        return Err(UnsafeQuery::UnterminatedLiteral);
                    }
                    if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        out.extend_from_slice(b"  ");
                        i += 2;
                        break;
                    }
                    out.push(if bytes[i].is_ascii() { b' ' } else { bytes[i] });
                    i += 1;
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    // Non-ASCII bytes are copied verbatim so the buffer stays valid UTF-8.
    String::from_utf8(out).map_err(|_| UnsafeQuery::UnterminatedLiteral)
}
