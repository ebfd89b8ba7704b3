use crate::migration::VersionCatalog;
use anyhow::{Result, anyhow};
use std::path::Path;

/// Check the signature of every generated artifact in the store
pub async fn cmd_verify(store: &Path) -> Result<()> {
    println!("Verifying generated migrations in {}", store.display());

    let catalog = VersionCatalog::scan(store)?;
    let invalid = catalog.verify_all()?;

    if invalid.is_empty() {
        println!("All signatures are valid ({} entries scanned)", catalog.len());
        return Ok(());
    }

    for entry in &invalid {
        println!("  {} - {}", entry.label, entry.path.display());
    }
    Err(anyhow!(
        "{} generated file(s) were modified after generation",
        invalid.len()
    ))
}
