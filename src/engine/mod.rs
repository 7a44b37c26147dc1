//! Storage provisioning engine.
//!
//! Every component takes the [`tracing::Span`] it logs under at construction.

pub mod layout;
pub mod storage;

pub use layout::LayoutEngine;
pub use storage::{
    controller::{ControllerProvider, MvcliProvider, StorageController},
    filesystem::Formatter,
    partitioning::PartitionPlanner,
    raid::RaidManager,
};
