use crate::migration::{SelectionScope, VersionCatalog, is_generated_label};
use anyhow::{Result, bail};
use std::path::Path;

/// List the store entries a database at `version` would get replayed
pub async fn cmd_status(store: &Path, version: &str, generated_only: bool) -> Result<()> {
    if !is_generated_label(version) {
        bail!("version '{}' has incorrect format", version);
    }

    let scope = if generated_only {
        SelectionScope::GeneratedOnly
    } else {
        SelectionScope::All
    };
    let catalog = VersionCatalog::scan(store)?;
    let entries = catalog.select_above_with_scope(version, scope)?;

    if entries.is_empty() {
        println!("Nothing to apply above {}", version);
        return Ok(());
    }

    println!("Entries to apply above {}:", version);
    for entry in &entries {
        println!(
            "  {} ({}, {} file(s))",
            entry.label,
            entry.kind,
            entry.files.len()
        );
    }
    Ok(())
}
