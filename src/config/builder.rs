use crate::config::{merge::Merge, types::*};
use crate::error::{MigratorError, Result};
use std::path::{Path, PathBuf};

pub struct ConfigBuilder {
    config_input: ConfigInput,
    root_dir: PathBuf,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config_input: ConfigInput::default(),
            root_dir: PathBuf::from("."),
        }
    }

    /// Relative store paths from the config file resolve against this directory
    pub fn with_root_dir(mut self, root_dir: &Path) -> Self {
        self.root_dir = root_dir.to_path_buf();
        self
    }

    pub fn with_file(mut self, file_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(file_input);
        self
    }

    pub fn with_cli_args(mut self, cli_input: ConfigInput) -> Self {
        self.config_input = self.config_input.merge(cli_input);
        self
    }

    pub fn resolve(self) -> Result<Config> {
        let store_defaults = Store::default();
        let transport_defaults = Transport::default();
        let generation_defaults = Generation::default();

        Ok(Config {
            clusters: self.resolve_clusters()?,
            store: self.resolve_store(&store_defaults),
            transport: self.resolve_transport(&transport_defaults),
            generation: self.resolve_generation(&generation_defaults),
        })
    }

    /// Store settings alone, for commands that never reach a cluster
    pub fn resolve_store_only(self) -> Store {
        self.resolve_store(&Store::default())
    }

    fn resolve_clusters(&self) -> Result<Clusters> {
        let input = self.config_input.clusters.as_ref();

        let dev = input
            .and_then(|c| c.dev.as_ref())
            .cloned()
            .or_else(|| std::env::var("PGMIGRATOR_DEV").ok())
            .ok_or_else(|| MigratorError::configuration("dev", "cluster is not configured"))?;
        let prod = input
            .and_then(|c| c.prod.as_ref())
            .cloned()
            .or_else(|| std::env::var("PGMIGRATOR_PROD").ok())
            .ok_or_else(|| MigratorError::configuration("prod", "cluster is not configured"))?;

        let dev = ClusterRef::parse("dev", &dev)?;
        let prod = ClusterRef::parse("prod", &prod)?;
        let tmp = match input.and_then(|c| c.tmp.as_ref()) {
            Some(tmp) => ClusterRef::parse("tmp", tmp)?,
            None => dev.scratch_sibling(),
        };

        if tmp == dev || tmp == prod {
            return Err(MigratorError::configuration(
                "tmp",
                format!("scratch cluster '{}' must differ from dev and prod", tmp),
            ));
        }

        Ok(Clusters { dev, prod, tmp })
    }

    fn resolve_store(&self, defaults: &Store) -> Store {
        let store_input = self.config_input.store.as_ref();

        let migrations_dir = store_input
            .and_then(|s| s.migrations_dir.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| defaults.migrations_dir.clone());

        Store {
            migrations_dir: if migrations_dir.is_absolute() {
                migrations_dir
            } else {
                self.root_dir.join(migrations_dir)
            },
            no_save: store_input
                .and_then(|s| s.no_save)
                .unwrap_or(defaults.no_save),
        }
    }

    fn resolve_transport(&self, defaults: &Transport) -> Transport {
        let transport_input = self.config_input.transport.as_ref();

        Transport {
            ssh_user: transport_input
                .and_then(|t| t.ssh_user.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.ssh_user.clone()),
            ssh_quiet: transport_input
                .and_then(|t| t.ssh_quiet)
                .unwrap_or(defaults.ssh_quiet),
            gzipped: transport_input
                .and_then(|t| t.gzipped)
                .unwrap_or(defaults.gzipped),
        }
    }

    fn resolve_generation(&self, defaults: &Generation) -> Generation {
        let gen_input = self.config_input.generation.as_ref();

        Generation {
            exclude_schemas: gen_input
                .and_then(|g| g.exclude_schemas.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.exclude_schemas.clone()),
            post_exec: gen_input
                .and_then(|g| g.post_exec.as_ref())
                .filter(|sql| !sql.trim().is_empty())
                .cloned()
                .or_else(|| defaults.post_exec.clone()),
            with_data: gen_input
                .and_then(|g| g.with_data)
                .unwrap_or(defaults.with_data),
            external_replication: gen_input
                .and_then(|g| g.external_replication)
                .unwrap_or(defaults.external_replication),
            diff_command: gen_input
                .and_then(|g| g.diff_command.as_ref())
                .cloned()
                .or_else(|| defaults.diff_command.clone()),
            diff_tool_jar: gen_input
                .and_then(|g| g.diff_tool_jar.as_ref())
                .cloned()
                .unwrap_or_else(|| defaults.diff_tool_jar.clone()),
            verbose: gen_input
                .and_then(|g| g.verbose)
                .unwrap_or(defaults.verbose),
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
