pub mod commands;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod migrate;
pub mod migration;
pub mod progress;
pub mod transport;
