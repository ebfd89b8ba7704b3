use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use pgmigrator::commands;
use pgmigrator::config::{
    self, ClusterArgs, ConfigBuilder, ConfigInput, GenerationArgs, GenerationInput, StoreArgs,
    TransportArgs,
};
use pgmigrator::constants::CONFIG_FILENAME;
use pgmigrator::progress::RunReporter;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level, debug messages in the run log)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signed migration taking prod to the dev schema
    Generate {
        #[command(flatten)]
        cluster_args: ClusterArgs,

        #[command(flatten)]
        store_args: StoreArgs,

        #[command(flatten)]
        transport_args: TransportArgs,

        #[command(flatten)]
        generation_args: GenerationArgs,
    },

    /// Check the signatures of every generated migration in the store
    Verify {
        #[command(flatten)]
        store_args: StoreArgs,
    },

    /// List the migrations a database at the given version would get
    Status {
        /// Version recorded in the database (YYYY-MM-DD-HH-MM-SS-mig)
        #[arg(long)]
        version: String,

        /// Leave manual entries out
        #[arg(long)]
        generated_only: bool,

        #[command(flatten)]
        store_args: StoreArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);

    let ok = tokio::select! {
        result = run_main(cli) => result?,
        _ = wait_for_shutdown_signal() => {
            info!("Received shutdown signal, stopping...");
            false
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn" // default level
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn store_only_input(store_args: &StoreArgs) -> ConfigInput {
    ConfigInput {
        store: Some(store_args.clone().into()),
        ..Default::default()
    }
}

async fn run_main(cli: Cli) -> Result<bool> {
    let (file_config, root_dir) = config::load_config(&cli.config_file)?;

    match &cli.command {
        Commands::Generate {
            cluster_args,
            store_args,
            transport_args,
            generation_args,
        } => {
            let mut generation: GenerationInput = generation_args.clone().into();
            generation.verbose = cli.verbose.then_some(true);
            let cli_config = ConfigInput {
                clusters: Some(cluster_args.clone().into()),
                store: Some(store_args.clone().into()),
                transport: Some(transport_args.clone().into()),
                generation: Some(generation),
            };

            let reporter = RunReporter::new(cli.verbose);
            let config = match ConfigBuilder::new()
                .with_root_dir(&root_dir)
                .with_file(file_config)
                .with_cli_args(cli_config)
                .resolve()
            {
                Ok(config) => config,
                Err(e) => {
                    reporter.error(&e.to_string());
                    return Ok(false);
                }
            };
            let reporter = RunReporter::new(config.generation.verbose);

            info!("Generating migration into {}", config.store.migrations_dir.display());
            Ok(commands::cmd_generate(&config, &reporter).await)
        }
        Commands::Verify { store_args } => {
            let store = ConfigBuilder::new()
                .with_root_dir(&root_dir)
                .with_file(file_config)
                .with_cli_args(store_only_input(store_args))
                .resolve_store_only();

            commands::cmd_verify(&store.migrations_dir).await?;
            Ok(true)
        }
        Commands::Status {
            version,
            generated_only,
            store_args,
        } => {
            let store = ConfigBuilder::new()
                .with_root_dir(&root_dir)
                .with_file(file_config)
                .with_cli_args(store_only_input(store_args))
                .resolve_store_only();

            commands::cmd_status(&store.migrations_dir, version, *generated_only).await?;
            Ok(true)
        }
    }
}
