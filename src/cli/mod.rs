//! CLI module - argument parsing

mod args;

pub use args::{default_bins_path, Cli, Commands};
