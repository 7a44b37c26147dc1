//! Provisioning primitives: partitions, RAID arrays and filesystems.

pub mod controller;
pub mod filesystem;
pub mod partitioning;
pub mod raid;
