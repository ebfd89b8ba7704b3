//! Collaborators the pipeline talks to: something that runs commands against
//! a named cluster, something that dumps a schema, and the schema diff tool.
//!
//! The core only builds typed [`CommandSpec`] values. Rendering them into
//! shell text (database placeholders, quoting, temp files) is the job of the
//! executor implementation.

pub mod apgdiff;
pub mod command;
pub mod dump;
pub mod ssh;

pub use apgdiff::ApgDiffTool;
pub use command::{CommandKind, CommandSpec};
pub use dump::RemoteDumpService;
pub use ssh::SshExecutor;

use crate::config::ClusterRef;
use crate::error::Result;
use async_trait::async_trait;

/// Runs a command against a cluster and returns its stdout.
///
/// Anything written to the diagnostic stream is a failure and must come back
/// as `MigratorError::Execution` carrying the raw diagnostic text.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(&self, cluster: &ClusterRef, spec: &CommandSpec) -> Result<String>;
}

#[async_trait]
pub trait DumpService: Send + Sync {
    async fn dump(
        &self,
        cluster: &ClusterRef,
        include_data: bool,
        excluded_schemas: &[String],
    ) -> Result<String>;
}

/// Black-box structural diff: SQL turning `from_dump` into `to_dump`
#[async_trait]
pub trait SchemaDiffTool: Send + Sync {
    async fn diff(&self, from_dump: &str, to_dump: &str) -> Result<String>;
}
