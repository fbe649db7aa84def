//! CLI command handlers
//!
//! Handlers that are not part of the build/run/watch engine live here.

pub mod devices;
pub mod doctor;
pub mod init;
