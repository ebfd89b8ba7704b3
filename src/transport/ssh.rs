use super::{CommandKind, CommandSpec, RemoteExecutor};
use crate::config::{ClusterRef, Transport};
use crate::error::{MigratorError, Result};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs PostgreSQL client tools on the cluster host over ssh
#[derive(Debug, Clone)]
pub struct SshExecutor {
    user: String,
    quiet: bool,
    gzipped: bool,
}

impl SshExecutor {
    pub fn new(transport: &Transport) -> Self {
        Self {
            user: transport.ssh_user.clone(),
            quiet: transport.ssh_quiet,
            gzipped: transport.gzipped,
        }
    }

    /// Remote shell text for `spec`, plus the payload to feed on stdin
    pub fn render(&self, cluster: &ClusterRef, spec: &CommandSpec) -> (String, Option<String>) {
        let db = &cluster.database;
        let (mut inner, stdin) = match &spec.kind {
            CommandKind::Dump {
                include_data,
                excluded_schemas,
            } => {
                let mut cmd = String::from("pg_dump");
                if !include_data {
                    cmd.push_str(" -s");
                }
                cmd.push(' ');
                cmd.push_str(&shell_quote(db));
                for schema in excluded_schemas {
                    cmd.push_str(" -N ");
                    cmd.push_str(&shell_quote(schema));
                }
                (cmd, None)
            }
            CommandKind::ExecuteSql { single_transaction } => {
                let sql = spec.sql.clone().unwrap_or_default();
                let mut cmd = format!("psql -d {}", shell_quote(db));
                if *single_transaction {
                    cmd.push_str(" --single-transaction");
                }
                if sql.contains('\n') {
                    // Multi-line SQL travels on stdin into a remote file so
                    // psql reports file line numbers on failure.
                    let remote_file = shell_quote(&format!("/tmp/pgmigrator_{}.sql", db));
                    (
                        format!("cat > {f}; {cmd} -f {f}", f = remote_file, cmd = cmd),
                        Some(sql),
                    )
                } else {
                    cmd.push_str(" -c ");
                    cmd.push_str(&shell_quote(&sql));
                    (cmd, None)
                }
            }
            CommandKind::FetchCell => {
                let query = spec.sql.clone().unwrap_or_default();
                (
                    format!(
                        "psql -d {} -t -P format=unaligned -c {}",
                        shell_quote(db),
                        shell_quote(&query)
                    ),
                    None,
                )
            }
            CommandKind::CreateDatabase => (
                format!(
                    "psql -c {}",
                    shell_quote(&format!("CREATE DATABASE {}", quote_ident(db)))
                ),
                None,
            ),
            CommandKind::DropDatabase => (
                format!(
                    "psql -c {}",
                    shell_quote(&format!("DROP DATABASE {}", quote_ident(db)))
                ),
                None,
            ),
        };

        if self.gzipped && stdin.is_none() {
            inner.push_str(" | gzip -9fc");
        }
        (inner, stdin)
    }

    fn ssh_args(&self, cluster: &ClusterRef, inner: String) -> Vec<String> {
        let mut args = Vec::new();
        if self.quiet {
            args.push("-q".to_string());
        }
        args.extend(
            ["-C", "-o", "Compression=yes", "-o", "CompressionLevel=9"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(format!("{}@{}", self.user, cluster.host));
        args.push(inner);
        args
    }

    fn build_command(&self, args: Vec<String>, decompress: bool) -> Command {
        if decompress {
            let pipeline = format!(
                "ssh {} | gzip -d",
                args.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
            );
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(pipeline);
            cmd
        } else {
            let mut cmd = Command::new("ssh");
            cmd.args(args);
            cmd
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, cluster: &ClusterRef, spec: &CommandSpec) -> Result<String> {
        debug!("$ [{}] {}", cluster, spec.describe());

        let (inner, stdin) = self.render(cluster, spec);
        let decompress = self.gzipped && stdin.is_none();
        let mut command = self.build_command(self.ssh_args(cluster, inner), decompress);
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| MigratorError::remote(format!("failed to start ssh: {}", e)))?;

        let writer = match (stdin, child.stdin.take()) {
            (Some(payload), Some(mut pipe)) => Some(tokio::spawn(async move {
                let result = pipe.write_all(payload.as_bytes()).await;
                drop(pipe);
                result
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| MigratorError::remote(format!("failed to wait for ssh: {}", e)))?;

        let sent = match writer {
            Some(writer) => Some(
                writer
                    .await
                    .map_err(|e| MigratorError::remote(format!("stdin writer panicked: {}", e)))?,
            ),
            None => None,
        };

        interpret_output(cluster, output, sent)
    }
}

/// Remote stderr wins over a failed stdin write: a refused connection also
/// breaks the pipe.
fn interpret_output(
    cluster: &ClusterRef,
    output: Output,
    sent: Option<std::io::Result<()>>,
) -> Result<String> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(MigratorError::remote(stderr.into_owned()));
    }
    if let Some(Err(e)) = sent {
        return Err(MigratorError::remote(format!("failed to send SQL: {}", e)));
    }
    if !output.status.success() {
        return Err(MigratorError::remote(format!(
            "remote command on '{}' exited with {}",
            cluster, output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Single-quote a word for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
