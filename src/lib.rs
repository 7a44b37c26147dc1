pub mod cli;
pub mod engine;
pub mod inventory;
pub mod logging;
pub mod validation;
pub mod wipe;

/// Stratum version as provided by cargo.
pub const STRATUM_VERSION: &str = env!("CARGO_PKG_VERSION");
