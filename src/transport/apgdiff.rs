use super::SchemaDiffTool;
use crate::error::{MigratorError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::debug;

/// apgdiff invoked as `java -jar`, comparing two dumps staged on local disk
#[derive(Debug, Clone)]
pub struct ApgDiffTool {
    jar: PathBuf,
}

impl ApgDiffTool {
    pub fn new(jar: PathBuf) -> Self {
        Self { jar }
    }

    /// Find the jar matching `pattern`. Relative patterns are tried next to
    /// the running executable first, then in the working directory. When
    /// several versions match, the last one by name wins.
    pub fn locate(pattern: &str) -> Result<Self> {
        let mut candidates = Vec::new();
        if Path::new(pattern).is_absolute() {
            candidates.push(PathBuf::from(pattern));
        } else {
            if let Ok(exe) = std::env::current_exe()
                && let Some(dir) = exe.parent()
            {
                candidates.push(dir.join(pattern));
            }
            candidates.push(PathBuf::from(pattern));
        }

        for candidate in &candidates {
            let glob_pattern = candidate.to_string_lossy();
            let Ok(paths) = glob::glob(&glob_pattern) else {
                continue;
            };
            let mut matches: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
            matches.sort();
            if let Some(jar) = matches.pop() {
                debug!("Using schema diff tool {}", jar.display());
                return Ok(Self::new(jar));
            }
        }

        Err(MigratorError::configuration(
            "diff_tool_jar",
            format!("cannot find '{}'", pattern),
        ))
    }

    pub fn args(&self, from_file: &Path, to_file: &Path) -> Vec<String> {
        let mut args = vec![
            "-jar".to_string(),
            self.jar.to_string_lossy().to_string(),
            "--ignore-start-with".to_string(),
        ];
        let jar_name = self
            .jar
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if jar_name.contains("1.2") {
            args.push("--quote-names".to_string());
        }
        args.push(from_file.to_string_lossy().to_string());
        args.push(to_file.to_string_lossy().to_string());
        args
    }
}

pub(crate) fn stage(prefix: &str, content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".sql")
        .tempfile()
        .map_err(|e| MigratorError::io(std::env::temp_dir(), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| MigratorError::io(file.path(), e))?;
    Ok(file)
}

#[async_trait]
impl SchemaDiffTool for ApgDiffTool {
    async fn diff(&self, from_dump: &str, to_dump: &str) -> Result<String> {
        let from_file = stage("dump_tmp_", from_dump)?;
        let to_file = stage("dump_dev_", to_dump)?;

        let output = Command::new("java")
            .args(self.args(from_file.path(), to_file.path()))
            .output()
            .await
            .map_err(|e| MigratorError::DiffTool {
                diagnostic: format!("failed to start java: {}", e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() || !output.status.success() {
            // Leave the inputs behind for debugging.
            let kept: Vec<String> = [from_file, to_file]
                .into_iter()
                .filter_map(|f| f.into_temp_path().keep().ok())
                .map(|p| p.display().to_string())
                .collect();
            debug!("Kept diff inputs: {}", kept.join(", "));
            let diagnostic = if stderr.trim().is_empty() {
                format!("apgdiff exited with {}", output.status)
            } else {
                stderr.trim_end().to_string()
            };
            return Err(MigratorError::DiffTool { diagnostic });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
