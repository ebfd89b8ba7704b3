//! Error kinds raised by the migration pipeline.
//!
//! Every variant is fatal for the run; non-fatal conditions (unparseable
//! store entries, dropping a scratch database that does not exist) are logged
//! where they happen and never surface here.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = MigratorError> = std::result::Result<T, E>;

/// Line-level context recovered from a psql diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// 1-indexed line of the executed SQL that failed
    pub line: usize,
    /// Numbered excerpt of the executed SQL ending at the failing line
    pub snippet: String,
    /// Remainder of the diagnostic after the line number
    pub message: String,
}

#[derive(Debug, Error)]
pub enum MigratorError {
    #[error("invalid configuration for '{key}': {reason}")]
    Configuration { key: String, reason: String },

    #[error("fetched version '{version}' has incorrect format")]
    InvalidVersion { version: String },

    #[error("directory '{second}' conflicts with directory '{first}' (label {label})")]
    NamingConflict {
        label: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid signature of '{path}'. Possibly it was created manually")]
    Signature { path: PathBuf },

    #[error("{}", render_execution(.origin, .diagnostic, .context))]
    Execution {
        origin: Option<String>,
        diagnostic: String,
        context: Option<ErrorContext>,
    },

    #[error("schema diff tool failed: {diagnostic}")]
    DiffTool { diagnostic: String },

    #[error("cannot find 'SET search_path ...' in the dump diff:\n{diff}")]
    DiffIntegrity { diff: String },

    #[error(
        "resulting database structure does not match the reference:\n{raw_diff}\n\n\n!!! Smart diff:\n{fingerprint_diff}"
    )]
    Equivalence {
        raw_diff: String,
        fingerprint_diff: String,
    },

    #[error("error creating '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigratorError {
    pub fn configuration(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Raw transport failure that has not been matched against any SQL yet
    pub fn remote(diagnostic: impl Into<String>) -> Self {
        Self::Execution {
            origin: None,
            diagnostic: diagnostic.into(),
            context: None,
        }
    }
}

fn render_execution(
    origin: &Option<String>,
    diagnostic: &str,
    context: &Option<ErrorContext>,
) -> String {
    let mut msg = match origin {
        Some(origin) => format!("SQL error while applying {}:\n", origin),
        None => String::new(),
    };
    match context {
        Some(ctx) => {
            msg.push_str("Error context:\n");
            msg.push_str(&ctx.snippet);
            msg.push_str(&format!("\n### Line {}{}", ctx.line, ctx.message));
        }
        None => msg.push_str(diagnostic.trim_end()),
    }
    msg
}
