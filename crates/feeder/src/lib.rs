//! Price feeder binary support
//!
//! Wires the price sources, the notifier and the chain side together from
//! the TOML configuration.

pub mod app;
pub mod cli;
pub mod logging;

pub use app::{register_pairs, App};
pub use cli::Args;
