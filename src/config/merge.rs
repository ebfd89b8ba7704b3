use crate::config::types::*;

/// Trait for merging optional configuration values
pub trait Merge<T> {
    fn merge(self, other: T) -> T;
}

fn merge_sections<T>(a: Option<T>, b: Option<T>, merge_with: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(merge_with(a, b)),
    }
}

impl Merge<ConfigInput> for ConfigInput {
    fn merge(self, other: ConfigInput) -> ConfigInput {
        ConfigInput {
            clusters: merge_sections(self.clusters, other.clusters, ClustersInput::merge_with),
            store: merge_sections(self.store, other.store, StoreInput::merge_with),
            transport: merge_sections(self.transport, other.transport, TransportInput::merge_with),
            generation: merge_sections(
                self.generation,
                other.generation,
                GenerationInput::merge_with,
            ),
        }
    }
}

impl ClustersInput {
    pub fn merge_with(self, other: ClustersInput) -> ClustersInput {
        ClustersInput {
            dev: other.dev.or(self.dev),
            prod: other.prod.or(self.prod),
            tmp: other.tmp.or(self.tmp),
        }
    }
}

impl StoreInput {
    pub fn merge_with(self, other: StoreInput) -> StoreInput {
        StoreInput {
            migrations_dir: other.migrations_dir.or(self.migrations_dir),
            no_save: other.no_save.or(self.no_save),
        }
    }
}

impl TransportInput {
    pub fn merge_with(self, other: TransportInput) -> TransportInput {
        TransportInput {
            ssh_user: other.ssh_user.or(self.ssh_user),
            ssh_quiet: other.ssh_quiet.or(self.ssh_quiet),
            gzipped: other.gzipped.or(self.gzipped),
        }
    }
}

impl GenerationInput {
    pub fn merge_with(self, other: GenerationInput) -> GenerationInput {
        GenerationInput {
            exclude_schemas: other.exclude_schemas.or(self.exclude_schemas),
            post_exec: other.post_exec.or(self.post_exec),
            with_data: other.with_data.or(self.with_data),
            external_replication: other.external_replication.or(self.external_replication),
            diff_command: other.diff_command.or(self.diff_command),
            diff_tool_jar: other.diff_tool_jar.or(self.diff_tool_jar),
            verbose: other.verbose.or(self.verbose),
        }
    }
}
