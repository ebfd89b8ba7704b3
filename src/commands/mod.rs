pub mod generate;
pub mod status;
pub mod verify;

pub use generate::{cmd_generate, run_generate};
pub use status::cmd_status;
pub use verify::cmd_verify;
