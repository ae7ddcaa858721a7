//! Fatal errors raised while scheduling and executing tasks.
//!
//! Every error here aborts the run. Orchestration code carries them inside
//! `anyhow::Error`; callers that need to react to a specific failure recover
//! it with `downcast_ref`.

use thiserror::Error;

use crate::core::types::{Effect, Familiar, Item, RiderSlot, Slot};

/// Task list or dependency declarations are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown task dependency '{dependency}' of '{task}'")]
    UnknownDependency { task: String, dependency: String },
    #[error("duplicate task name '{0}'")]
    DuplicateTask(String),
    #[error("reserved setting '{0}' cannot be overridden")]
    ReservedSetting(String),
    #[error("invalid task list:\n- {}", .0.join("\n- "))]
    Invalid(Vec<String>),
}

/// An item deficit persisted after every acquisition strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task} was unable to acquire {needed} {item} (have {have})")]
pub struct AcquisitionFailure {
    pub task: String,
    pub item: Item,
    pub needed: u32,
    pub have: u32,
}

/// The task requests more concurrent songs than the character can hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task} requests too many songs ({requested} > {limit}): {}", format_effects(.songs))]
pub struct EffectCapExceeded {
    pub task: String,
    pub requested: usize,
    pub limit: usize,
    pub songs: Vec<Effect>,
}

fn format_effects(effects: &[Effect]) -> String {
    effects
        .iter()
        .map(Effect::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A required placement of the task's outfit could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to equip all items for {task}: {reason}")]
pub struct EquipFailure {
    pub task: String,
    pub reason: String,
}

/// The maximizer failed, including after a forced inventory refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task} was unable to maximize {}", .goals.join(", "))]
pub struct MaximizationFailure {
    pub task: String,
    pub goals: Vec<String>,
}

/// What a dress commit expected to find but did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DressExpectation {
    Familiar(Familiar),
    Slot { slot: Slot, item: Item },
    Accessory { item: Item, count: u32 },
    Rider { rider: RiderSlot, familiar: Familiar },
    AccessorySlotsExhausted { item: Item },
}

impl std::fmt::Display for DressExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DressExpectation::Familiar(familiar) => write!(f, "familiar {}", familiar),
            DressExpectation::Slot { slot, item } => write!(f, "{} {}", slot, item),
            DressExpectation::Accessory { item, count } => write!(f, "acc {} x{}", item, count),
            DressExpectation::Rider { rider, familiar } => write!(f, "{} {}", rider, familiar),
            DressExpectation::AccessorySlotsExhausted { item } => {
                write!(f, "a free accessory slot for {}", item)
            }
        }
    }
}

/// Committed state does not match the planned assignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task} failed to fully dress (expected: {expected})")]
pub struct DressVerificationFailure {
    pub task: String,
    pub expected: DressExpectation,
}

/// Which limit a task violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Tries(u32),
    Soft(u32),
    Turns(u32),
    Unready,
    Completed,
    Guard,
}

/// The task did not complete and one of its limits tripped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Task {task} {}{}", describe_limit(.kind), suffix(.message))]
pub struct LimitExceeded {
    pub task: String,
    pub kind: LimitKind,
    pub message: Option<String>,
}

fn describe_limit(kind: &LimitKind) -> String {
    match kind {
        LimitKind::Tries(n) => format!(
            "did not complete within {} attempts. Please check what went wrong.",
            n
        ),
        LimitKind::Soft(n) => format!(
            "did not complete within {} attempts. Please check what went wrong (you may just be unlucky).",
            n
        ),
        LimitKind::Turns(n) => format!(
            "did not complete within {} turns. Please check what went wrong.",
            n
        ),
        LimitKind::Unready => "did not become unready. Please check what went wrong.".to_string(),
        LimitKind::Completed => {
            "did not become completed. Please check what went wrong.".to_string()
        }
        LimitKind::Guard => "failed its guard. Please check what went wrong.".to_string(),
    }
}

fn suffix(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(" {}", message),
        None => String::new(),
    }
}
