pub mod catalog;
pub mod label;
pub mod signature;

pub use catalog::{InvalidSignature, MigrationEntry, SelectionScope, SqlFile, VersionCatalog};
pub use label::{EntryKind, VersionLabel, is_generated_label, is_manual_label};
