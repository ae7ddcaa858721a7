//! Task scheduling and execution engine for scripted game sessions.
//!
//! A run is a list of [`task::Task`]s with dependencies. The
//! [`engine::Engine`] repeatedly picks the first available task, solves and
//! commits its outfit, compiles its combat macro, runs it, and checks its
//! limits. The crate is split the usual way:
//!
//! - **[`core`]**: pure logic (selection, outfit solving, macro compilation,
//!   limit checks). No I/O.
//! - **[`io`]**: the game session boundary ([`io::session::Session`]),
//!   setting overrides, config and manifest files.
//!
//! Orchestration modules ([`engine`], [`dress`], [`acquire`], [`select`],
//! [`validate`], [`compile`]) combine the two.

pub mod acquire;
pub mod compile;
pub mod core;
pub mod dress;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod select;
pub mod task;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
