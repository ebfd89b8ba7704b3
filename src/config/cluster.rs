use crate::config::types::ClusterRef;
use crate::constants::SCRATCH_DATABASE_PREFIX;
use crate::error::{MigratorError, Result};

impl ClusterRef {
    /// Parse a `host/database` reference configured under `key`
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        let value = value.trim();
        match value.split_once('/') {
            Some((host, database))
                if !host.is_empty() && !database.is_empty() && !database.contains('/') =>
            {
                Ok(Self {
                    host: host.to_string(),
                    database: database.to_string(),
                })
            }
            _ => Err(MigratorError::configuration(
                key,
                format!("expected host/database, got '{}'", value),
            )),
        }
    }

    /// Scratch database living next to this one
    pub fn scratch_sibling(&self) -> Self {
        Self {
            host: self.host.clone(),
            database: format!("{}{}", SCRATCH_DATABASE_PREFIX, self.database),
        }
    }
}
