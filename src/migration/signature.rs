//! Tamper evidence for generated artifacts.
//!
//! The hash is taken over the SQL with ASCII whitespace (space, tab, line
//! feed, vertical tab, form feed, carriage return) removed, so
//! reformatting an artifact keeps it valid while any other edit breaks it.
//! Artifacts signed by every earlier release must keep verifying: do not touch
//! the salt or the normalization.

use crate::constants::SIGNATURE_SALT;
use once_cell::sync::Lazy;
use regex::Regex;

static SIGNED_HEADER: Lazy<Regex> =
    Lazy::new(|| {
        Regex::new(r"(?s)^[[:space:]]*--[[:space:]]*([^[:space:]]+)[[:space:]]*(.*)")
            .expect("valid signature header regex")
    });

pub fn compute_signature(sql: &str) -> String {
    let collapsed: String = sql
        .chars()
        .filter(|c| !(c.is_ascii_whitespace() || *c == '\x0B'))
        .collect();
    format!("{:x}", md5::compute(format!("{}{}", SIGNATURE_SALT, collapsed)))
}

/// Prefix `sql` with its `-- <hash>` header line
pub fn sign(sql: &str) -> String {
    format!("-- {}\n{}", compute_signature(sql), sql)
}

pub fn verify(content: &str) -> bool {
    match SIGNED_HEADER.captures(content) {
        Some(caps) => caps[1] == compute_signature(&caps[2]),
        None => false,
    }
}
