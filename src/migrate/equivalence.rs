use super::fingerprint::{clean_dump, fingerprint};
use crate::db::Workspace;
use crate::error::{MigratorError, Result};
use crate::transport::apgdiff::stage;
use crate::transport::ssh::shell_quote;
use similar::TextDiff;
use tokio::process::Command;
use tracing::debug;

/// How the human-readable diff between two dumps is produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DumpDiffer {
    /// In-process unified diff that ignores whitespace and blank lines
    #[default]
    Builtin,
    /// Local shell command receiving the two texts as file arguments
    Command(String),
}

impl DumpDiffer {
    pub fn from_config(diff_command: Option<&str>) -> Self {
        match diff_command {
            Some(cmd) if !cmd.trim().is_empty() => Self::Command(cmd.trim().to_string()),
            _ => Self::Builtin,
        }
    }

    /// Empty when the texts only differ in whitespace
    pub async fn render(&self, left: &str, right: &str) -> Result<String> {
        match self {
            Self::Builtin => Ok(builtin_diff(left, right)),
            Self::Command(cmd) => command_diff(cmd, left, right).await,
        }
    }
}

fn squash(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.split_whitespace().collect::<String>())
        .filter(|l| !l.is_empty())
        .collect()
}

fn builtin_diff(left: &str, right: &str) -> String {
    if squash(left) == squash(right) {
        return String::new();
    }
    TextDiff::from_lines(left, right)
        .unified_diff()
        .context_radius(5)
        .header("scratch", "reference")
        .to_string()
        .trim_end()
        .to_string()
}

async fn command_diff(cmd: &str, left: &str, right: &str) -> Result<String> {
    let left_file = stage("diff_left_", left)?;
    let right_file = stage("diff_right_", right)?;
    let line = format!(
        "{} {} {}",
        cmd,
        shell_quote(&left_file.path().to_string_lossy()),
        shell_quote(&right_file.path().to_string_lossy())
    );
    debug!("Running diff display: {}", line);

    let output = Command::new("sh")
        .arg("-c")
        .arg(&line)
        .output()
        .await
        .map_err(|e| MigratorError::DiffTool {
            diagnostic: format!("failed to run '{}': {}", cmd, e),
        })?;

    // diff(1) exits with 1 when the inputs differ and above 1 on trouble.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let exited_cleanly = matches!(output.status.code(), Some(0) | Some(1));
    if !exited_cleanly || !stderr.trim().is_empty() {
        return Err(MigratorError::DiffTool {
            diagnostic: format!(
                "'{}' failed ({}): {}",
                cmd,
                output.status,
                stderr.trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Compare two dumps up to object and clause ordering.
///
/// Differences that survive fingerprinting but show up only as whitespace in
/// the readable diff are accepted.
pub async fn check_equivalence(
    scratch_dump: &str,
    reference_dump: &str,
    differ: &DumpDiffer,
) -> Result<()> {
    let scratch = clean_dump(scratch_dump);
    let reference = clean_dump(reference_dump);

    let scratch_fp = fingerprint(&scratch);
    let reference_fp = fingerprint(&reference);
    if scratch_fp == reference_fp {
        return Ok(());
    }

    let raw_diff = differ.render(&scratch, &reference).await?;
    if raw_diff.is_empty() {
        debug!("Fingerprints differ only in whitespace, accepting");
        return Ok(());
    }
    let fingerprint_diff = differ.render(&scratch_fp, &reference_fp).await?;

    Err(MigratorError::Equivalence {
        raw_diff,
        fingerprint_diff,
    })
}

/// Checks that the scratch database ended up with the reference structure
pub struct EquivalenceValidator<'w, 'a> {
    workspace: &'w Workspace<'a>,
    excluded_schemas: &'w [String],
    differ: &'w DumpDiffer,
}

impl<'w, 'a> EquivalenceValidator<'w, 'a> {
    pub fn new(
        workspace: &'w Workspace<'a>,
        excluded_schemas: &'w [String],
        differ: &'w DumpDiffer,
    ) -> Self {
        Self {
            workspace,
            excluded_schemas,
            differ,
        }
    }

    pub async fn validate(&self, reference_dump: &str) -> Result<()> {
        self.workspace
            .reporter()
            .log("Checking that the resulting structure matches the reference...");
        let scratch_dump = self.workspace.dump(self.excluded_schemas).await?;
        check_equivalence(&scratch_dump, reference_dump, self.differ).await
    }
}
