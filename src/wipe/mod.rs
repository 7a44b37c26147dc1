//! Secure erase of whole drives.
//!
//! The [`selector`] maps a drive's protocol and capabilities to a [`Wiper`],
//! and the [`WipeOrchestrator`] runs one wiper per requested drive under a
//! shared deadline.

use std::{future::Future, path::Path};

use stratum_api::error::StratumError;

mod orchestrator;
mod selector;
mod wiper;

pub use orchestrator::WipeOrchestrator;
pub use selector::{select_method, WipePlan};
pub use wiper::Wiper;

/// Runs a wiper against a drive. Implemented by the host and by test doubles.
pub trait WipeExecutor: Send + Sync + 'static {
    fn wipe(
        &self,
        disk: &Path,
        wiper: &Wiper,
    ) -> impl Future<Output = Result<(), StratumError>> + Send;
}
