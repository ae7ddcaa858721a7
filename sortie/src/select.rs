//! Selection helpers for `sortie select`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::selector::next_available;
use crate::io::manifest::{Manifest, PlannedTask, load_manifest, load_settings};

/// Structured selection outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Every task is completed.
    Complete,
    /// The first available task in declaration order.
    Next(String),
    /// Some tasks are incomplete but none is available.
    Stuck { pending: Vec<String> },
}

/// Select the next task of a manifest against a settings snapshot.
pub fn select_task(
    manifest: &Manifest,
    settings: &BTreeMap<String, String>,
) -> Result<SelectOutcome> {
    let plan = manifest.plan(settings)?;
    if let Some(task) = next_available(&plan, |t| t.completed, |t| t.ready)? {
        return Ok(SelectOutcome::Next(task.name.clone()));
    }
    let pending: Vec<String> = plan
        .iter()
        .filter(|t| !t.completed)
        .map(|t: &PlannedTask| t.name.clone())
        .collect();
    if pending.is_empty() {
        Ok(SelectOutcome::Complete)
    } else {
        Ok(SelectOutcome::Stuck { pending })
    }
}

/// Load a manifest (and optional settings file) and select the next task.
pub fn select_from_path(manifest: &Path, settings: Option<&Path>) -> Result<SelectOutcome> {
    let manifest = load_manifest(manifest).context("load manifest for selection")?;
    let settings = match settings {
        Some(path) => load_settings(path)?,
        None => BTreeMap::new(),
    };
    select_task(&manifest, &settings)
}
