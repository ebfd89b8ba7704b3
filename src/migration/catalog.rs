use super::label::{EntryKind, VersionLabel};
use super::signature;
use crate::error::{MigratorError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One SQL file inside a store entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlFile {
    /// `<label>/<file name>`, used to annotate replayed SQL
    pub relative_path: String,
    pub path: PathBuf,
    pub content: String,
}

/// A dated directory of the migration store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    pub label: VersionLabel,
    pub kind: EntryKind,
    pub source_path: PathBuf,
    pub files: Vec<SqlFile>,
}

/// Which entries `select_above` keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionScope {
    #[default]
    All,
    /// Only generated artifacts; manual SQL is dropped entirely
    GeneratedOnly,
}

/// Generated artifact file whose signature did not verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSignature {
    pub label: VersionLabel,
    pub path: PathBuf,
}

/// Ordered view of every valid entry in one or more store roots
#[derive(Debug, Clone, Default)]
pub struct VersionCatalog {
    entries: BTreeMap<VersionLabel, PathBuf>,
}

impl VersionCatalog {
    /// Scan the immediate subdirectories of a migration store
    pub fn scan(store: &Path) -> Result<Self> {
        Self::scan_roots(&[store])
    }

    /// Scan several store roots into one catalog. A label present under two
    /// roots is a conflict.
    pub fn scan_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Self> {
        let mut entries: BTreeMap<VersionLabel, PathBuf> = BTreeMap::new();

        for root in roots {
            let root = root.as_ref();
            let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
                .map_err(|e| MigratorError::io(root, e))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();

            for dir in dirs {
                let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                    warn!("Skipping '{}': name is not valid UTF-8", dir.display());
                    continue;
                };
                let Some(label) = VersionLabel::parse(name) else {
                    warn!("Skipping '{}': name format is invalid", dir.display());
                    continue;
                };
                if let Some(first) = entries.get(&label) {
                    return Err(MigratorError::NamingConflict {
                        label: label.to_string(),
                        first: first.clone(),
                        second: dir,
                    });
                }
                entries.insert(label, dir);
            }
        }

        debug!("Scanned {} store entries", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in ascending order
    pub fn labels(&self) -> impl Iterator<Item = &VersionLabel> {
        self.entries.keys()
    }

    /// Entries that must be replayed on top of a database at `version`.
    ///
    /// Generated entries come first, in ascending order; manual entries
    /// survive only when they sit above the last generated one. Every
    /// generated file is signature-checked before anything is returned.
    pub fn select_above(&self, version: &str) -> Result<Vec<MigrationEntry>> {
        self.select_above_with_scope(version, SelectionScope::All)
    }

    pub fn select_above_with_scope(
        &self,
        version: &str,
        scope: SelectionScope,
    ) -> Result<Vec<MigrationEntry>> {
        let mut generated: Vec<(&VersionLabel, &PathBuf)> = Vec::new();
        let mut pending_manual: Vec<(&VersionLabel, &PathBuf)> = Vec::new();

        for (label, dir) in self.entries.iter().filter(|(l, _)| l.is_above(version)) {
            match label.kind() {
                EntryKind::Generated => {
                    // A generated migration already contains every manual
                    // change released before it.
                    pending_manual.clear();
                    generated.push((label, dir));
                }
                EntryKind::Manual => pending_manual.push((label, dir)),
            }
        }

        if scope == SelectionScope::GeneratedOnly {
            pending_manual.clear();
        }

        let mut selected = Vec::with_capacity(generated.len() + pending_manual.len());
        for (label, dir) in generated.into_iter().chain(pending_manual) {
            selected.push(load_entry(label, dir)?);
        }

        for entry in selected.iter().filter(|e| e.kind == EntryKind::Generated) {
            for file in &entry.files {
                if !signature::verify(&file.content) {
                    return Err(MigratorError::Signature {
                        path: file.path.clone(),
                    });
                }
            }
        }

        Ok(selected)
    }

    /// Check every generated artifact in the store, whatever its version
    pub fn verify_all(&self) -> Result<Vec<InvalidSignature>> {
        let mut invalid = Vec::new();
        for (label, dir) in &self.entries {
            if label.kind() != EntryKind::Generated {
                continue;
            }
            let entry = load_entry(label, dir)?;
            for file in entry.files {
                if !signature::verify(&file.content) {
                    invalid.push(InvalidSignature {
                        label: label.clone(),
                        path: file.path,
                    });
                }
            }
        }
        Ok(invalid)
    }
}

fn load_entry(label: &VersionLabel, dir: &Path) -> Result<MigrationEntry> {
    Ok(MigrationEntry {
        label: label.clone(),
        kind: label.kind(),
        source_path: dir.to_path_buf(),
        files: discover_sql_files(label, dir)?,
    })
}

/// `*.sql` files directly inside an entry directory, sorted by file name
fn discover_sql_files(label: &VersionLabel, dir: &Path) -> Result<Vec<SqlFile>> {
    let pattern = dir.join("*.sql");
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern).map_err(|e| {
        MigratorError::configuration("migrations_dir", format!("bad path '{}': {}", pattern, e))
    })?;

    let mut files = Vec::new();
    for path in paths.filter_map(|p| p.ok()).filter(|p| p.is_file()) {
        let content = std::fs::read_to_string(&path).map_err(|e| MigratorError::io(&path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        files.push(SqlFile {
            relative_path: format!("{}/{}", label, file_name),
            path,
            content,
        });
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}
