//! Line context for failures reported by psql.
//!
//! psql run with `-f` reports errors as `psql:<file>:<line>: ERROR: ...`.
//! The line refers to the text we sent, so the failing region can be cut out
//! of the SQL we still hold.

use crate::constants::ERROR_CONTEXT_LINES;
use crate::error::{ErrorContext, MigratorError};
use crate::progress::number_lines;
use once_cell::sync::Lazy;
use regex::Regex;

static LOCATED_DIAGNOSTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^([^:\s]+:[^:]+:)(\d+)(:.*)").expect("valid diagnostic regex")
});

const ELISION_MARKER: &str = "-- ...";

/// Recover line context from a `<tool>:<context>:<line>:<message>` diagnostic
pub fn extract_context(diagnostic: &str, sql: &str) -> Option<ErrorContext> {
    let caps = LOCATED_DIAGNOSTIC.captures(diagnostic)?;
    let line: usize = caps[2].parse().ok()?;
    if line == 0 {
        return None;
    }

    Some(ErrorContext {
        line,
        snippet: format_line_context(sql, line),
        message: caps[3].trim_end().to_string(),
    })
}

/// Up to [`ERROR_CONTEXT_LINES`] lines before `error_line` plus the line
/// itself, numbered, with elision markers around the excerpt
pub fn format_line_context(sql: &str, error_line: usize) -> String {
    let lines: Vec<&str> = sql.split('\n').collect();
    let mut from_line = error_line.saturating_sub(ERROR_CONTEXT_LINES).max(1);
    let start = (from_line - 1).min(lines.len());
    let end = error_line.min(lines.len());

    let mut excerpt: Vec<&str> = lines[start..end].to_vec();
    if from_line > 1 {
        excerpt.insert(0, ELISION_MARKER);
        from_line -= 1;
    }
    excerpt.push(ELISION_MARKER);

    number_lines(&excerpt.join("\n"), from_line)
}

/// Attach SQL line context to an execution failure when the diagnostic
/// carries a line number; anything else passes through unchanged
pub fn decorate(error: MigratorError, sql: &str, origin: Option<&str>) -> MigratorError {
    match error {
        MigratorError::Execution {
            diagnostic,
            context: None,
            origin: None,
        } => {
            let context = extract_context(&diagnostic, sql);
            MigratorError::Execution {
                origin: origin.map(str::to_string),
                diagnostic,
                context,
            }
        }
        other => other,
    }
}
