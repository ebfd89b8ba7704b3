use super::{CommandSpec, DumpService, RemoteExecutor};
use crate::config::ClusterRef;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// `pg_dump` run through a [`RemoteExecutor`]
pub struct RemoteDumpService {
    executor: Arc<dyn RemoteExecutor>,
}

impl RemoteDumpService {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl DumpService for RemoteDumpService {
    async fn dump(
        &self,
        cluster: &ClusterRef,
        include_data: bool,
        excluded_schemas: &[String],
    ) -> Result<String> {
        let spec = CommandSpec::dump(include_data, excluded_schemas);
        let dump = self.executor.run(cluster, &spec).await?;
        debug!("Dumped {} bytes from '{}'", dump.len(), cluster);
        Ok(dump)
    }
}
