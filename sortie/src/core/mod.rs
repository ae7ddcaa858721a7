//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They read the character
//! through [`inventory::Inventory`] and return plans that the orchestration
//! layer commits to the session.

pub mod combat;
pub mod combat_macro;
pub mod delayed;
pub mod inventory;
pub mod invariants;
pub mod limit;
pub mod modes;
pub mod outfit;
pub mod outfit_spec;
pub mod selector;
pub mod songs;
pub mod types;
pub mod wanderers;
