use clap::Args;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Raw configuration input - all fields Optional for merging
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    pub clusters: Option<ClustersInput>,
    pub store: Option<StoreInput>,
    pub transport: Option<TransportInput>,
    pub generation: Option<GenerationInput>,
}

/// Resolved configuration with all defaults applied
#[derive(Debug, Clone)]
pub struct Config {
    pub clusters: Clusters,
    pub store: Store,
    pub transport: Transport,
    pub generation: Generation,
}

/// A `host/database` pair the tool can dump from or run SQL against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterRef {
    pub host: String,
    pub database: String,
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.database)
    }
}

// Cluster configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClustersInput {
    pub dev: Option<String>,
    pub prod: Option<String>,
    pub tmp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Clusters {
    /// Reference schema the migration must reach
    pub dev: ClusterRef,
    /// Production schema the migration starts from; never written
    pub prod: ClusterRef,
    /// Scratch database rebuilt on every run
    pub tmp: ClusterRef,
}

// Migration store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreInput {
    pub migrations_dir: Option<String>,
    pub no_save: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Store {
    pub migrations_dir: PathBuf,
    /// Write the artifact to a temporary file instead of the store
    pub no_save: bool,
}

// Remote command transport configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TransportInput {
    pub ssh_user: Option<String>,
    pub ssh_quiet: Option<bool>,
    pub gzipped: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Transport {
    pub ssh_user: String,
    /// Pass `-q` to ssh so banners do not end up on the diagnostic stream
    pub ssh_quiet: bool,
    /// Compress command output with gzip on the remote side
    pub gzipped: bool,
}

// Migration generation configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationInput {
    pub exclude_schemas: Option<Vec<String>>,
    pub post_exec: Option<String>,
    pub with_data: Option<bool>,
    pub external_replication: Option<bool>,
    pub diff_command: Option<String>,
    pub diff_tool_jar: Option<String>,
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Generation {
    /// Schemas left out of every dump
    pub exclude_schemas: Vec<String>,
    /// SQL applied after the diff and appended to the artifact
    pub post_exec: Option<String>,
    /// Copy production data into the scratch database, not just structure
    pub with_data: bool,
    /// An external replication tool manages transactions and sessions, so the
    /// artifact carries neither a transaction wrapper nor the psql preamble
    pub external_replication: bool,
    /// Command used to display dump differences, replacing the built-in diff
    pub diff_command: Option<String>,
    /// Glob locating the schema diff tool jar
    pub diff_tool_jar: String,
    pub verbose: bool,
}

// CLI argument groups
#[derive(Debug, Clone, Default, Args)]
pub struct ClusterArgs {
    #[arg(long, help = "Reference (development) cluster as host/database")]
    pub dev: Option<String>,

    #[arg(long, help = "Production cluster as host/database")]
    pub prod: Option<String>,

    #[arg(long, help = "Scratch cluster as host/database (default: dev host, _tmp_ database)")]
    pub tmp: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    #[arg(long = "dir", help = "Migration store directory")]
    pub migrations_dir: Option<String>,

    #[arg(long, help = "Write the result to a temporary file instead of the store")]
    pub no_save: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TransportArgs {
    #[arg(long, help = "Remote user for ssh connections")]
    pub ssh_user: Option<String>,

    #[arg(long = "ssh-q", help = "Run ssh in quiet mode")]
    pub ssh_quiet: bool,

    #[arg(long, help = "Gzip command output on the remote side")]
    pub gzipped: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GenerationArgs {
    #[arg(long, help = "Schemas to leave out of dumps (comma or space separated)")]
    pub exclude: Option<String>,

    #[arg(long, help = "SQL to run after the generated diff")]
    pub postexec: Option<String>,

    #[arg(long, help = "Copy production data into the scratch database")]
    pub with_data: bool,

    #[arg(long, help = "Do not wrap the migration in a transaction (external replication)")]
    pub slonik: bool,

    #[arg(long, help = "Command used to display dump differences")]
    pub diff: Option<String>,

    #[arg(long, help = "Glob locating the apgdiff jar")]
    pub diff_tool_jar: Option<String>,
}

// Conversion functions from CLI args to config input
impl From<ClusterArgs> for ClustersInput {
    fn from(args: ClusterArgs) -> Self {
        Self {
            dev: args.dev,
            prod: args.prod,
            tmp: args.tmp,
        }
    }
}

impl From<StoreArgs> for StoreInput {
    fn from(args: StoreArgs) -> Self {
        Self {
            migrations_dir: args.migrations_dir,
            no_save: args.no_save.then_some(true),
        }
    }
}

impl From<TransportArgs> for TransportInput {
    fn from(args: TransportArgs) -> Self {
        Self {
            ssh_user: args.ssh_user,
            ssh_quiet: args.ssh_quiet.then_some(true),
            gzipped: args.gzipped.then_some(true),
        }
    }
}

impl From<GenerationArgs> for GenerationInput {
    fn from(args: GenerationArgs) -> Self {
        Self {
            exclude_schemas: args.exclude.as_deref().map(split_schema_list),
            post_exec: args.postexec,
            with_data: args.with_data.then_some(true),
            external_replication: args.slonik.then_some(true),
            diff_command: args.diff,
            diff_tool_jar: args.diff_tool_jar,
            verbose: None,
        }
    }
}

/// Split a `schema1,schema2 schema3` list, dropping empty items
pub fn split_schema_list(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
