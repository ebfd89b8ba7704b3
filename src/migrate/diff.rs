use crate::config::ClusterRef;
use crate::constants::SEARCH_PATH_QUERY;
use crate::db::{Remote, Workspace};
use crate::error::{MigratorError, Result};
use crate::transport::SchemaDiffTool;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SEARCH_PATH_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(SET search_path = [^;]+)").expect("valid search_path regex"));

// A run of search_path statements followed by another one or by the end of
// the text: everything but the last statement (or the tail) is a no-op.
static REDUNDANT_SEARCH_PATHS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^SET search_path = [^;]+;\s*)+(^SET search_path = [^;]+;|[;\s]*\z)")
        .expect("valid redundant search_path regex")
});

/// Normalized output of the schema diff tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    /// Executed diff SQL, empty when the schemas already match
    pub sql: String,
    /// Reference dump the diff was computed against
    pub reference_dump: String,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Append the reference search path to every `SET search_path` so objects
/// living in extension schemas still resolve.
///
/// A non-empty diff with no `SET search_path` at all means the tool did not
/// produce what we expect.
pub fn qualify_search_paths(diff: &str, search_path: &str) -> Result<String> {
    if !SEARCH_PATH_STATEMENT.is_match(diff) {
        if diff.trim().is_empty() {
            return Ok(diff.to_string());
        }
        return Err(MigratorError::DiffIntegrity {
            diff: diff.to_string(),
        });
    }

    Ok(SEARCH_PATH_STATEMENT
        .replace_all(diff, |caps: &Captures| {
            format!("{}, {}", &caps[1], search_path)
        })
        .into_owned())
}

/// Drop search_path switches that are not followed by any statement
pub fn collapse_search_paths(diff: &str) -> String {
    REDUNDANT_SEARCH_PATHS.replace_all(diff, "${2}").into_owned()
}

/// True when only whitespace and statement terminators remain
pub fn is_effectively_empty(sql: &str) -> bool {
    sql.chars().all(|c| c.is_whitespace() || c == ';')
}

/// Full normalization; returns an empty string when nothing is left to apply
pub fn normalize_diff(diff: &str, search_path: &str) -> Result<String> {
    let qualified = qualify_search_paths(diff, search_path)?;
    let collapsed = collapse_search_paths(&qualified);
    if is_effectively_empty(&collapsed) {
        return Ok(String::new());
    }
    Ok(collapsed)
}

/// Computes, normalizes and applies the diff from scratch to reference
pub struct DiffGenerator<'w, 'a> {
    workspace: &'w Workspace<'a>,
    remote: &'w Remote,
    diff_tool: &'w dyn SchemaDiffTool,
    excluded_schemas: &'w [String],
}

impl<'w, 'a> DiffGenerator<'w, 'a> {
    pub fn new(
        workspace: &'w Workspace<'a>,
        remote: &'w Remote,
        diff_tool: &'w dyn SchemaDiffTool,
        excluded_schemas: &'w [String],
    ) -> Self {
        Self {
            workspace,
            remote,
            diff_tool,
            excluded_schemas,
        }
    }

    pub async fn generate_and_apply(&self, reference: &ClusterRef) -> Result<DiffResult> {
        let reporter = self.workspace.reporter();

        reporter.log(&format!("Fetching search_path from '{}' cluster...", reference));
        let search_path = self.remote.fetch_cell(reference, SEARCH_PATH_QUERY).await?;

        reporter.log("Generating <diff>...");
        let scratch_dump = self.workspace.dump(self.excluded_schemas).await?;
        let reference_dump = self
            .remote
            .dumper
            .dump(reference, false, self.excluded_schemas)
            .await?;
        reporter.debug(&format!("(dumped {} bytes)", reference_dump.len()));

        let raw = self.diff_tool.diff(&scratch_dump, &reference_dump).await?;
        let normalized = normalize_diff(&raw, &search_path)?;

        let sql = if normalized.is_empty() {
            String::new()
        } else {
            self.workspace
                .apply_sql(&normalized, Some("generated <diff>"), true)
                .await?
        };

        Ok(DiffResult {
            sql,
            reference_dump,
        })
    }
}
