//! Relayer library
//!
//! Makes a message sent on a rollup executable on its settlement layer, using
//! the procedure of the rollup's chain family.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod program;
pub mod strategy;

// Re-export for convenience
pub use config::{NetworkConfig, RelayArgs};
pub use dispatch::{create, supported_networks, NetworkFamily};
pub use error::RelayError;
pub use strategy::RelayStrategy;
