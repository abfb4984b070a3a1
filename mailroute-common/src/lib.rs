//! Pieces shared by every mailroute crate.

pub mod logging;

pub use tracing;
