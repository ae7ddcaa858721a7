//! I/O adapters: the game session boundary, settings, config and manifests.

pub mod config;
pub mod manifest;
pub mod session;
pub mod settings;
