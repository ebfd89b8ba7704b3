use crate::db::Workspace;
use crate::error::Result;
use crate::migration::{EntryKind, MigrationEntry};

/// What replaying store entries left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSql {
    /// Executed manual SQL, in replay order, destined for the new artifact
    pub manual_sql: String,
    /// Number of manual files replayed
    pub manual_files: usize,
    /// Number of generated files replayed (never part of `manual_sql`)
    pub generated_files: usize,
}

/// Replays selected store entries against the scratch database
pub struct IncrementalApplier<'w, 'a> {
    workspace: &'w Workspace<'a>,
}

impl<'w, 'a> IncrementalApplier<'w, 'a> {
    pub fn new(workspace: &'w Workspace<'a>) -> Self {
        Self { workspace }
    }

    /// Generated entries bring the scratch database to the state production
    /// will have once they are released, but were already shipped and must
    /// not be shipped again; only manual SQL is collected.
    pub async fn apply(&self, entries: &[MigrationEntry]) -> Result<AppliedSql> {
        let mut applied = AppliedSql::default();

        for entry in entries {
            for file in &entry.files {
                match entry.kind {
                    EntryKind::Manual => {
                        let executed = self
                            .workspace
                            .apply_sql(file.content.trim(), Some(&file.relative_path), true)
                            .await?;
                        applied.manual_sql.push_str(&executed);
                        applied.manual_files += 1;
                    }
                    EntryKind::Generated => {
                        // Artifacts carry their own transaction wrapper.
                        self.workspace
                            .apply_sql(file.content.trim(), Some(&file.relative_path), false)
                            .await?;
                        applied.generated_files += 1;
                    }
                }
            }
        }

        Ok(applied)
    }
}
