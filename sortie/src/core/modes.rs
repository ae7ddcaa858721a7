//! Per-item configuration modes requested by an outfit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Requested configuration for one configurable item class.
///
/// Most classes take a single value. Some take two independent parts, either
/// of which may be left open for another spec to fill.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeSetting {
    Single(String),
    Pair(Option<String>, Option<String>),
}

impl ModeSetting {
    pub fn pair(first: Option<&str>, second: Option<&str>) -> Self {
        ModeSetting::Pair(first.map(str::to_string), second.map(str::to_string))
    }

    /// Merge two requests for the same class, or `None` if they conflict.
    ///
    /// Unset parts of a pair are always compatible.
    pub fn merge(&self, other: &ModeSetting) -> Option<ModeSetting> {
        match (self, other) {
            (ModeSetting::Single(a), ModeSetting::Single(b)) => {
                (a == b).then(|| ModeSetting::Single(a.clone()))
            }
            (ModeSetting::Pair(a1, a2), ModeSetting::Pair(b1, b2)) => {
                let first = merge_part(a1, b1)?;
                let second = merge_part(a2, b2)?;
                Some(ModeSetting::Pair(first, second))
            }
            _ => None,
        }
    }

    /// Render as a single command argument (`a b` for a full pair).
    pub fn render(&self) -> String {
        match self {
            ModeSetting::Single(value) => value.clone(),
            ModeSetting::Pair(first, second) => [first, second]
                .into_iter()
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn merge_part(a: &Option<String>, b: &Option<String>) -> Option<Option<String>> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => None,
        (Some(a), _) => Some(Some(a.clone())),
        (None, b) => Some(b.clone()),
    }
}

/// Mode selections keyed by item class (e.g. `"umbrella"`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modes(BTreeMap<String, ModeSetting>);

/// A class whose requested value differs from the one already set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeConflict {
    pub class: String,
    pub existing: ModeSetting,
    pub requested: ModeSetting,
}

impl Modes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class: impl Into<String>, setting: ModeSetting) -> Self {
        self.0.insert(class.into(), setting);
        self
    }

    pub fn get(&self, class: &str) -> Option<&ModeSetting> {
        self.0.get(class)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModeSetting)> {
        self.0.iter()
    }

    /// Merge `other` into `self` only if no class conflicts.
    pub fn merge(&mut self, other: &Modes) -> Result<(), ModeConflict> {
        let mut merged = self.0.clone();
        for (class, requested) in &other.0 {
            let next = match merged.get(class) {
                None => requested.clone(),
                Some(existing) => existing.merge(requested).ok_or_else(|| ModeConflict {
                    class: class.clone(),
                    existing: existing.clone(),
                    requested: requested.clone(),
                })?,
            };
            merged.insert(class.clone(), next);
        }
        self.0 = merged;
        Ok(())
    }
}
