pub mod run_reporter;

pub use run_reporter::{RunReporter, number_lines};
