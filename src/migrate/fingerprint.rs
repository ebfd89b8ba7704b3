//! Order-insensitive canonical form of a pg_dump schema dump.
//!
//! pg_dump emits objects in an order that depends on OIDs and catalog state,
//! and clauses inside an object (grants, constraints) can come out in any
//! order too. Two dumps describing the same schema produce the same
//! fingerprint. Column order inside `CREATE TABLE` is kept because it changes
//! what positional row literals bind to.

use once_cell::sync::Lazy;
use regex::Regex;

static DUMP_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?mi)",
        r"^[ \t]*START\s+WITH\s+\d+[ \t]*\r?\n",
        r#"|^CREATE\s+TYPE\s+\S*"?enum_migration_version"?[\s\S]*?\);"#,
        r"|^SET\s+default_with_oids\s*=\s*(?:true|false);",
    ))
    .expect("valid dump noise regex")
});

static BLANK_LINE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\n+").expect("valid blank line regex"));

static OBJECT_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^--\s*^--\s*Name:.*\s*^--\s*").expect("valid object header regex")
});

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m),$").expect("valid trailing comma regex"));

static TABLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*CREATE TABLE ").expect("valid table block regex"));

/// Remove fragments that change between dumps without any schema change:
/// sequence restart values, the version bookkeeping type and
/// `default_with_oids`
pub fn clean_dump(dump: &str) -> String {
    DUMP_NOISE.replace_all(dump, "").into_owned()
}

pub fn fingerprint(dump: &str) -> String {
    let dump = dump.replace('\r', "");
    let dump = BLANK_LINE_RUNS.replace_all(&dump, "\n");

    let mut blocks: Vec<String> = OBJECT_HEADER.split(&dump).map(canonical_block).collect();
    blocks.sort();
    blocks.join("\n")
}

fn canonical_block(block: &str) -> String {
    let block = TRAILING_COMMA.replace_all(block, "");
    if TABLE_BLOCK.is_match(&block) {
        return block.into_owned();
    }
    let mut lines: Vec<&str> = block.split('\n').collect();
    lines.sort_unstable();
    lines.join("\n")
}
