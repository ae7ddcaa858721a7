//! Offline macro compilation for `sortie compile`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::combat::{CombatDefaults, CombatResources, CombatStrategy};
use crate::core::types::Location;

/// Macro text compiled from a strategy with no task resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStrategy {
    pub macro_text: String,
    pub autoattack: String,
}

/// Compile a strategy. Actions without a default generator are dropped.
pub fn compile_strategy(
    strategy: &CombatStrategy,
    defaults: &CombatDefaults,
    location: Option<&Location>,
) -> CompiledStrategy {
    let resources = CombatResources::<()>::new();
    CompiledStrategy {
        macro_text: strategy.compile(&resources, defaults, location).to_string(),
        autoattack: strategy
            .compile_autoattack(&resources, defaults, location)
            .to_string(),
    }
}

/// Load a JSON strategy file and compile it with no defaults.
pub fn compile_from_path(path: &Path, location: Option<&Location>) -> Result<CompiledStrategy> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read strategy {}", path.display()))?;
    let strategy: CombatStrategy = serde_json::from_str(&contents)
        .with_context(|| format!("parse strategy {}", path.display()))?;
    Ok(compile_strategy(&strategy, &CombatDefaults::new(), location))
}
