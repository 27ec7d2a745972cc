//! Normalization of query text before it is handed to the transport.
//!
//! Export sessions run exactly one SELECT statement. Text supplied by callers is
//! often pasted from documents or scripts, so it is cleaned up first:
//!
//! - typographic quotes are replaced by their ASCII counterparts
//! - comments are dropped and the text is split into statements on `;`
//! - only the first statement is kept
//! - a bare table name becomes `select * from <table>`

use crate::error::ConfigurationError;

/// Result of normalizing query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// The statement sent to the transport.
    pub sql: String,
    /// Number of statements that followed the first one and were discarded.
    pub dropped_statements: usize,
    /// Whether the input was a table name rewritten into a full select.
    pub from_table: bool,
}

/// Normalizes caller-supplied query text.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidQuery` if the text contains no statement
/// or ends inside a quoted literal.
pub fn normalize_query(text: &str) -> Result<NormalizedQuery, ConfigurationError> {
    let cleaned = replace_curly_quotes(text);
    let statements = split_statements(&cleaned)?;

    let mut iter = statements.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| ConfigurationError::InvalidQuery("no statement found".to_string()))?;
    let dropped_statements = iter.count();

    let from_table = !is_select(&first);
    let sql = if from_table {
        format!("select * from {first}")
    } else {
        first
    };

    Ok(NormalizedQuery {
        sql,
        dropped_statements,
        from_table,
    })
}

/// Replaces typographic single and double quotes with ASCII quotes.
#[must_use]
pub fn replace_curly_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect()
}

fn is_select(statement: &str) -> bool {
    let first_word = statement
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(first_word.as_str(), "select" | "sel" | "with")
}

/// Splits text into trimmed, non-empty statements.
///
/// Semicolons inside string literals and quoted identifiers do not split, and
/// `--` / `/* */` comments are removed.
fn split_statements(text: &str) -> Result<Vec<String>, ConfigurationError> {
    let chars: Vec<char> = text.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            current.push(c);
            if c == q {
                // A doubled quote is an escaped quote, not the end of the literal.
                if i + 1 < chars.len() && chars[i + 1] == q {
                    current.push(q);
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                current.push(' ');
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                current.push(' ');
                continue;
            }
            ';' => {
                push_statement(&mut statements, &mut current);
            }
            _ => current.push(c),
        }
        i += 1;
    }

    if quote.is_some() {
        return Err(ConfigurationError::InvalidQuery(
            "unterminated quoted literal".to_string(),
        ));
    }
    push_statement(&mut statements, &mut current);

    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    current.clear();
}
