//! Port traits the core depends on.

pub mod bar_source;
pub mod config_port;
pub mod execution_port;
