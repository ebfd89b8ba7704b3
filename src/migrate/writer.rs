use crate::constants::{ARTIFACT_FILENAME, version_set_statement};
use crate::error::{MigratorError, Result};
use crate::migration::VersionLabel;
use crate::migration::signature;
use crate::progress::RunReporter;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// SQL sections that end up in a new artifact, in order
#[derive(Debug, Clone, Default)]
pub struct ArtifactParts<'s> {
    pub manual_sql: &'s str,
    pub diff_sql: &'s str,
    pub post_sql: Option<&'s str>,
}

fn statement_section(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    if sql.trim().is_empty() {
        return String::new();
    }
    format!("{};\n\n", sql)
}

/// Unsigned artifact body
pub fn assemble_artifact(
    parts: &ArtifactParts<'_>,
    label: &VersionLabel,
    external_replication: bool,
) -> String {
    let mut sql = statement_section(parts.manual_sql);
    sql.push_str(&statement_section(parts.diff_sql));

    let mut sql = sql.trim_end().to_string();
    if !sql.is_empty() {
        sql.push_str("\n\n");
    }
    sql.push_str(&version_set_statement(label.as_str()));
    sql.push_str("\n\n");

    if let Some(post_sql) = parts.post_sql {
        sql.push_str(post_sql);
    }

    if external_replication {
        sql
    } else {
        format!("START TRANSACTION;\n\n{}\nCOMMIT;", sql.trim())
    }
}

/// Signed artifact ready to be written, with carriage returns removed
pub fn render_artifact(
    parts: &ArtifactParts<'_>,
    label: &VersionLabel,
    external_replication: bool,
) -> String {
    signature::sign(&assemble_artifact(parts, label, external_replication)).replace('\r', "")
}

/// Persists rendered artifacts into the store, or into a kept temp file
pub struct MigrationWriter<'a> {
    store: &'a Path,
    no_save: bool,
    reporter: &'a RunReporter,
}

impl<'a> MigrationWriter<'a> {
    pub fn new(store: &'a Path, no_save: bool, reporter: &'a RunReporter) -> Self {
        Self {
            store,
            no_save,
            reporter,
        }
    }

    pub fn is_no_save(&self) -> bool {
        self.no_save
    }

    pub fn write(&self, label: &VersionLabel, artifact: &str) -> Result<PathBuf> {
        if self.no_save {
            return self.write_scratch_file(label, artifact);
        }

        let dir = self.store.join(label.as_str());
        let file = dir.join(ARTIFACT_FILENAME);

        // An existing label directory holds a released artifact; never reuse it.
        fs::create_dir(&dir).map_err(|e| MigratorError::io(&dir, e))?;

        if let Err(e) = fs::write(&file, artifact) {
            let _ = fs::remove_file(&file);
            let _ = fs::remove_dir(&dir);
            return Err(MigratorError::io(&file, e));
        }

        Ok(file)
    }

    fn write_scratch_file(&self, label: &VersionLabel, artifact: &str) -> Result<PathBuf> {
        let tmp_dir = std::env::temp_dir();
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}_", label))
            .suffix(".sql")
            .tempfile()
            .map_err(|e| MigratorError::io(&tmp_dir, e))?;
        file.write_all(artifact.as_bytes())
            .map_err(|e| MigratorError::io(file.path(), e))?;

        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| MigratorError::io(&tmp_dir, e.error))?;

        tracing::warn!("Store left untouched, artifact written to {}", path.display());
        self.reporter
            .log("WARNING: no-save mode, the artifact goes to a temp file!");
        Ok(path)
    }
}
