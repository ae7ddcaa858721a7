//! Validation helpers for `sortie validate`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::io::config::load_config;
use crate::io::manifest::load_manifest;

/// Summary of a valid manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub quests: usize,
    pub tasks: usize,
}

/// Validate a manifest (schema + task graph) and, if given, an engine config.
pub fn validate_manifest(manifest: &Path, config: Option<&Path>) -> Result<ValidateOutcome> {
    if let Some(config) = config {
        load_config(config)
            .and_then(|cfg| cfg.validate().map(|()| cfg))
            .with_context(|| format!("validate config {}", config.display()))?;
    }
    let manifest = load_manifest(manifest)?;
    let tasks = manifest.tasks()?;
    Ok(ValidateOutcome {
        quests: manifest.quests.len(),
        tasks: tasks.len(),
    })
}
