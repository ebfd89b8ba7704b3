use super::error_context;
use crate::config::ClusterRef;
use crate::constants::PSQL_SESSION_PREAMBLE;
use crate::error::Result;
use crate::progress::RunReporter;
use crate::transport::{CommandSpec, DumpService, RemoteExecutor};
use std::sync::Arc;

/// Shared handles every stage needs to reach remote clusters
#[derive(Clone)]
pub struct Remote {
    pub executor: Arc<dyn RemoteExecutor>,
    pub dumper: Arc<dyn DumpService>,
}

impl Remote {
    /// Single-cell query result with surrounding whitespace removed
    pub async fn fetch_cell(&self, cluster: &ClusterRef, query: &str) -> Result<String> {
        let out = self
            .executor
            .run(cluster, &CommandSpec::fetch_cell(query))
            .await?;
        Ok(out.trim().to_string())
    }
}

/// The scratch database of one run.
///
/// Only ever created by [`WorkspaceBuilder::rebuild`]; the production and
/// reference clusters are never reachable through it.
pub struct Workspace<'a> {
    cluster: ClusterRef,
    remote: Remote,
    reporter: &'a RunReporter,
    external_replication: bool,
}

impl<'a> Workspace<'a> {
    pub fn cluster(&self) -> &ClusterRef {
        &self.cluster
    }

    pub fn reporter(&self) -> &'a RunReporter {
        self.reporter
    }

    /// Structure-only dump of the scratch database
    pub async fn dump(&self, excluded_schemas: &[String]) -> Result<String> {
        let dump = self
            .remote
            .dumper
            .dump(&self.cluster, false, excluded_schemas)
            .await?;
        self.reporter.debug(&format!("(dumped {} bytes)", dump.len()));
        Ok(dump)
    }

    /// Run SQL against the scratch database and return exactly the text that
    /// was executed, annotated with where it came from.
    ///
    /// Failures with a psql line number are decorated with the surrounding
    /// lines of that text.
    pub async fn apply_sql(
        &self,
        sql: &str,
        origin: Option<&str>,
        single_transaction: bool,
    ) -> Result<String> {
        let body = if self.external_replication {
            sql.to_string()
        } else {
            format!("{}\n{}", PSQL_SESSION_PREAMBLE, sql)
        };
        let header = match origin {
            Some(origin) => format!("-- Applying {} --\n", origin),
            None => "-------------------------------\n".to_string(),
        };
        let executed = format!("{}{}", header, body.trim());

        self.reporter.log_sql(&executed);
        self.remote
            .executor
            .run(
                &self.cluster,
                &CommandSpec::execute_sql(executed.clone(), single_transaction),
            )
            .await
            .map_err(|e| error_context::decorate(e, &executed, origin))?;

        Ok(format!("{}\n\n", executed))
    }
}

pub struct WorkspaceBuilder<'a> {
    remote: Remote,
    scratch: ClusterRef,
    reporter: &'a RunReporter,
    external_replication: bool,
}

impl<'a> WorkspaceBuilder<'a> {
    pub fn new(remote: Remote, scratch: ClusterRef, reporter: &'a RunReporter) -> Self {
        Self {
            remote,
            scratch,
            reporter,
            external_replication: false,
        }
    }

    /// Leave out the psql session preamble from applied SQL
    pub fn external_replication(mut self, enabled: bool) -> Self {
        self.external_replication = enabled;
        self
    }

    /// Recreate the scratch database as a copy of `source`.
    ///
    /// Dropping may fail when the scratch database does not exist yet; that
    /// is logged and ignored. Drop-then-create makes re-runs safe.
    pub async fn rebuild(
        self,
        source: &ClusterRef,
        with_data: bool,
        excluded_schemas: &[String],
    ) -> Result<Workspace<'a>> {
        self.reporter
            .log(&format!("Copying database structure from '{}'...", source));
        let dump = self
            .remote
            .dumper
            .dump(source, with_data, excluded_schemas)
            .await?;
        self.reporter.debug(&format!("(dumped {} bytes)", dump.len()));

        if let Err(e) = self
            .remote
            .executor
            .run(&self.scratch, &CommandSpec::drop_database())
            .await
        {
            self.reporter
                .debug(&format!("{} (ignoring)", e.to_string().trim()));
        }

        self.remote
            .executor
            .run(&self.scratch, &CommandSpec::create_database())
            .await?;

        let loaded = self
            .remote
            .executor
            .run(&self.scratch, &CommandSpec::execute_sql(dump, true))
            .await?;
        self.reporter.debug(&format!(
            "(executed {} commands)",
            loaded.split_whitespace().count()
        ));

        Ok(Workspace {
            cluster: self.scratch,
            remote: self.remote,
            reporter: self.reporter,
            external_replication: self.external_replication,
        })
    }
}
