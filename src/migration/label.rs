use crate::constants::GENERATED_LABEL_FORMAT;
use chrono::{DateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static MANUAL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}(-[-\d]*)?$").expect("valid manual label regex"));

static GENERATED_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}-mig$").expect("valid generated label regex")
});

/// How a store entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Hand-written SQL under a date-named directory
    Manual,
    /// Signed artifact previously produced by this tool
    Generated,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Manual => write!(f, "manual"),
            EntryKind::Generated => write!(f, "generated"),
        }
    }
}

/// A validated store directory name.
///
/// Both grammars are zero-padded and date-first, so plain string ordering is
/// chronological ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionLabel(String);

impl VersionLabel {
    /// Parse a directory name, returning None when it matches neither grammar
    pub fn parse(name: &str) -> Option<Self> {
        if is_generated_label(name) || is_manual_grammar(name) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    /// Build the label of a new generated artifact from a point in time
    pub fn generated_at<Tz: TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(at.format(GENERATED_LABEL_FORMAT).to_string())
    }

    pub fn kind(&self) -> EntryKind {
        if is_generated_label(&self.0) {
            EntryKind::Generated
        } else {
            EntryKind::Manual
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when this label sorts strictly after `version`
    pub fn is_above(&self, version: &str) -> bool {
        self.0.as_str() > version
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VersionLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Full-timestamp `-mig` grammar used by generated artifacts and by the
/// version recorded in a managed database
pub fn is_generated_label(name: &str) -> bool {
    GENERATED_LABEL.is_match(name)
}

fn is_manual_grammar(name: &str) -> bool {
    MANUAL_LABEL.is_match(name)
}

/// Matches the date grammar but is not a generated artifact
pub fn is_manual_label(name: &str) -> bool {
    is_manual_grammar(name) && !is_generated_label(name)
}
