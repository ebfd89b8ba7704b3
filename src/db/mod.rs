pub mod error_context;
pub mod workspace;

pub use workspace::{Remote, Workspace, WorkspaceBuilder};
