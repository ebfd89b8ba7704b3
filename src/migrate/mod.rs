//! The migration pipeline.
//!
//! One run rebuilds the scratch database from production, replays every store
//! entry above the production version, closes the remaining gap to the
//! reference cluster with a generated diff, proves the result matches the
//! reference, and writes the combined SQL as a new signed store entry.

pub mod applier;
pub mod diff;
pub mod equivalence;
pub mod fingerprint;
pub mod writer;

pub use applier::{AppliedSql, IncrementalApplier};
pub use diff::{DiffGenerator, DiffResult};
pub use equivalence::{DumpDiffer, EquivalenceValidator};
pub use writer::{ArtifactParts, MigrationWriter};

use crate::config::Config;
use crate::constants::VERSION_GET_QUERY;
use crate::db::{Remote, WorkspaceBuilder};
use crate::error::{MigratorError, Result};
use crate::migration::{EntryKind, VersionCatalog, VersionLabel, is_generated_label};
use crate::progress::RunReporter;
use crate::transport::{
    ApgDiffTool, DumpService, RemoteDumpService, RemoteExecutor, SchemaDiffTool, SshExecutor,
};
use itertools::Itertools;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Everything the pipeline reaches outside the process through
#[derive(Clone)]
pub struct Collaborators {
    pub executor: Arc<dyn RemoteExecutor>,
    pub dumper: Arc<dyn DumpService>,
    pub diff_tool: Arc<dyn SchemaDiffTool>,
}

impl Collaborators {
    /// ssh + psql/pg_dump on the cluster hosts and apgdiff locally
    pub fn from_config(config: &Config) -> Result<Self> {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(SshExecutor::new(&config.transport));
        let dumper = Arc::new(RemoteDumpService::new(executor.clone()));
        let diff_tool = Arc::new(ApgDiffTool::locate(&config.generation.diff_tool_jar)?);
        Ok(Self {
            executor,
            dumper,
            diff_tool,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// New store entry created
    Written { label: VersionLabel, path: PathBuf },
    /// No-save mode: the artifact only exists as a temporary file
    Unsaved { label: VersionLabel, path: PathBuf },
    /// Nothing to release; the store was not touched
    NoChanges,
}

pub struct Migrator<'a> {
    config: &'a Config,
    collaborators: Collaborators,
    reporter: &'a RunReporter,
}

impl<'a> Migrator<'a> {
    pub fn new(config: &'a Config, collaborators: Collaborators, reporter: &'a RunReporter) -> Self {
        Self {
            config,
            collaborators,
            reporter,
        }
    }

    pub async fn execute(&self) -> Result<MigrationOutcome> {
        let store = &self.config.store.migrations_dir;
        let clusters = &self.config.clusters;
        let generation = &self.config.generation;
        let excluded = generation.exclude_schemas.as_slice();

        let store_name = store
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| store.display().to_string());
        self.reporter
            .log(&format!("##\n## Creating migration at {}\n##", store_name));

        if !store.is_dir() {
            return Err(MigratorError::configuration(
                "migrations_dir",
                format!("directory '{}' does not exist", store.display()),
            ));
        }

        let remote = Remote {
            executor: self.collaborators.executor.clone(),
            dumper: self.collaborators.dumper.clone(),
        };

        // Resolve and verify everything to replay before any dump is taken.
        let version = remote.fetch_cell(&clusters.prod, VERSION_GET_QUERY).await?;
        if !is_generated_label(&version) {
            return Err(MigratorError::InvalidVersion { version });
        }
        self.reporter.log(&format!("Version of 'prod': {}", version));

        let catalog = VersionCatalog::scan(store)?;
        let entries = catalog.select_above(&version)?;
        let planned = entries
            .iter()
            .map(|e| e.label.as_str())
            .chain(std::iter::once("<diff>"))
            .join(", ");
        self.reporter.log(&format!("Versions to apply: {}", planned));

        let workspace = WorkspaceBuilder::new(remote.clone(), clusters.tmp.clone(), self.reporter)
            .external_replication(generation.external_replication)
            .rebuild(&clusters.prod, generation.with_data, excluded)
            .await?;

        let applied = IncrementalApplier::new(&workspace).apply(&entries).await?;
        info!(
            manual = applied.manual_files,
            generated = applied.generated_files,
            "Replayed store entries"
        );

        let diff = DiffGenerator::new(
            &workspace,
            &remote,
            self.collaborators.diff_tool.as_ref(),
            excluded,
        )
        .generate_and_apply(&clusters.dev)
        .await?;

        let post_sql = match &generation.post_exec {
            Some(sql) => Some(workspace.apply_sql(sql, Some("post-SQL"), true).await?),
            None => None,
        };

        let differ = DumpDiffer::from_config(generation.diff_command.as_deref());
        EquivalenceValidator::new(&workspace, excluded, &differ)
            .validate(&diff.reference_dump)
            .await?;

        let has_manual = entries.iter().any(|e| e.kind == EntryKind::Manual);
        if !has_manual && diff.is_empty() {
            self.reporter.log(&format!(
                "No changes detected for {}. Release directory was not created.",
                store_name
            ));
            return Ok(MigrationOutcome::NoChanges);
        }

        let label = VersionLabel::generated_at(&chrono::Local::now());
        let parts = ArtifactParts {
            manual_sql: &applied.manual_sql,
            diff_sql: &diff.sql,
            post_sql: post_sql.as_deref(),
        };
        let artifact = writer::render_artifact(&parts, &label, generation.external_replication);

        let writer = MigrationWriter::new(store, self.config.store.no_save, self.reporter);
        let path = writer.write(&label, &artifact)?;
        self.reporter.log(&format!("RESULT: {}", path.display()));

        if writer.is_no_save() {
            Ok(MigrationOutcome::Unsaved { label, path })
        } else {
            Ok(MigrationOutcome::Written { label, path })
        }
    }
}
