use crate::config::types::*;
use crate::constants::{DEFAULT_DIFF_TOOL_JAR, DEFAULT_SSH_USER};
use std::path::PathBuf;

// Clusters have no default: a run without dev and prod is a configuration error.

impl Default for Store {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            no_save: false,
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            ssh_user: DEFAULT_SSH_USER.to_string(),
            ssh_quiet: false,
            gzipped: false,
        }
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            exclude_schemas: vec![],
            post_exec: None,
            with_data: false,
            external_replication: false,
            diff_command: None,
            diff_tool_jar: DEFAULT_DIFF_TOOL_JAR.to_string(),
            verbose: false,
        }
    }
}
