pub mod config;
pub mod constants;
pub mod error;
pub mod model;
