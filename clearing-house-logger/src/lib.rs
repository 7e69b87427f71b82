//! Tracing setup shared by the clearing house binaries.

pub mod logging;

pub use logging::{init, LogConfig, LogFormat, LogOutput};
