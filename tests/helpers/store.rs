use anyhow::Result;
use pgmigrator::constants::ARTIFACT_FILENAME;
use pgmigrator::migration::signature;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Migration store in a temporary directory
pub struct TestStore {
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_manual(&self, label: &str, file_name: &str, sql: &str) -> Result<PathBuf> {
        let dir = self.path().join(label);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        fs::write(&path, sql)?;
        Ok(path)
    }

    pub fn add_generated(&self, label: &str, sql: &str) -> Result<PathBuf> {
        self.add_manual(label, ARTIFACT_FILENAME, &signature::sign(sql))
    }

    /// Generated artifact edited by hand after signing
    pub fn add_tampered(&self, label: &str, sql: &str) -> Result<PathBuf> {
        let signed = signature::sign(sql);
        self.add_manual(label, ARTIFACT_FILENAME, &format!("{}\nDROP TABLE users;", signed))
    }

    /// Directory names in the store, sorted
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}
