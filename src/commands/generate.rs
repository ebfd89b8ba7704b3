use crate::config::Config;
use crate::migrate::{Collaborators, MigrationOutcome, Migrator};
use crate::progress::RunReporter;
use tracing::{error, info};

/// Run the pipeline with the production collaborators.
///
/// Every failure is reported on stderr; the result only says whether the
/// run succeeded.
pub async fn cmd_generate(config: &Config, reporter: &RunReporter) -> bool {
    let collaborators = match Collaborators::from_config(config) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            error!("{}", e);
            reporter.error(&e.to_string());
            return false;
        }
    };
    run_generate(config, collaborators, reporter).await
}

pub async fn run_generate(
    config: &Config,
    collaborators: Collaborators,
    reporter: &RunReporter,
) -> bool {
    match Migrator::new(config, collaborators, reporter).execute().await {
        Ok(MigrationOutcome::Written { label, path }) => {
            info!("Created {} at {}", label, path.display());
            true
        }
        Ok(MigrationOutcome::Unsaved { label, path }) => {
            info!("Created {} in temporary file {}", label, path.display());
            true
        }
        Ok(MigrationOutcome::NoChanges) => true,
        Err(e) => {
            error!("{}", e);
            reporter.error(&e.to_string());
            false
        }
    }
}
