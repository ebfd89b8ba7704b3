// Migration store layout
pub const ARTIFACT_FILENAME: &str = "10_ddl.sql";
pub const GENERATED_LABEL_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-mig";

// Configuration file name
pub const CONFIG_FILENAME: &str = "pgmigrator.yaml";

// Artifact signing. Changing the salt invalidates every artifact ever signed.
pub const SIGNATURE_SALT: &str = "a secret signature, do not generate manual: ";

// Version bookkeeping functions living in the managed database
pub const VERSION_GET_QUERY: &str = "SELECT migration.migration_version_get()";
pub const SEARCH_PATH_QUERY: &str = "SHOW search_path";

pub fn version_set_statement(label: &str) -> String {
    format!("SELECT migration.migration_version_set('{}');", label)
}

// Prepended to every SQL batch sent through psql unless an external
// replication tool owns the session.
pub const PSQL_SESSION_PREAMBLE: &str = "\\set ON_ERROR_STOP on\n\\set VERBOSITY terse\nSET client_min_messages TO warning;";

// Lines of SQL shown above a failing line in execution errors
pub const ERROR_CONTEXT_LINES: usize = 20;

// Scratch database naming when `tmp` is not configured explicitly
pub const SCRATCH_DATABASE_PREFIX: &str = "_tmp_";

pub const DEFAULT_SSH_USER: &str = "postgres";
pub const DEFAULT_DIFF_TOOL_JAR: &str = "apgdiff-*.jar";
