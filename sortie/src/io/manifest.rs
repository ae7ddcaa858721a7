//! Declarative task manifests (`tasks.toml`).
//!
//! A manifest lists quests and their tasks in TOML. Loading checks the
//! document against the bundled JSON Schema, then the dependency graph.
//! Conditions are either constants or checks of persisted session settings,
//! so a manifest can be scheduled offline against a settings snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::combat::CombatStrategy;
use crate::core::outfit_spec::OutfitSpec;
use crate::core::selector::Scheduled;
use crate::core::types::{Effect, Item, Location};
use crate::task::{AcquireItem, Predicate, Quest, Task, TaskBody, TaskLimit, assemble, predicate};

const MANIFEST_SCHEMA: &str = include_str!("../../schemas/manifest.schema.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Tasks without `after` wait for the previous task of their quest.
    pub implicit_after: bool,
    #[serde(rename = "quest")]
    pub quests: Vec<QuestDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestDecl {
    pub name: String,
    #[serde(default)]
    pub completed: Option<Condition>,
    #[serde(default)]
    pub ready: Option<Condition>,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDecl {
    pub name: String,
    #[serde(default)]
    pub after: Vec<String>,
    pub location: Location,
    #[serde(default = "Condition::never")]
    pub completed: Condition,
    #[serde(default)]
    pub ready: Option<Condition>,
    #[serde(default)]
    pub acquire: Vec<AcquireDecl>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Choice adventure id to option.
    #[serde(default)]
    pub choices: BTreeMap<String, String>,
    #[serde(default)]
    pub outfit: Option<OutfitSpec>,
    #[serde(default)]
    pub combat: Option<CombatStrategy>,
    #[serde(default)]
    pub limit: Option<LimitDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireDecl {
    pub item: Item,
    #[serde(default = "default_num")]
    pub num: u32,
    #[serde(default)]
    pub price: Option<u32>,
    #[serde(default)]
    pub optional: bool,
}

fn default_num() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitDecl {
    pub tries: Option<u32>,
    pub turns: Option<u32>,
    pub soft: Option<u32>,
    pub unready: bool,
    pub completed: bool,
    pub message: Option<String>,
}

/// A constant, or a check of one persisted setting.
///
/// Without `equals`, the setting holds when it is set to a non-empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Constant(bool),
    Setting {
        setting: String,
        #[serde(default)]
        equals: Option<String>,
    },
}

impl Condition {
    fn never() -> Self {
        Condition::Constant(false)
    }

    pub fn holds(&self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        match self {
            Condition::Constant(value) => *value,
            Condition::Setting { setting, equals } => match (lookup(setting), equals) {
                (Some(value), Some(expected)) => &value == expected,
                (Some(value), None) => !value.is_empty(),
                (None, _) => false,
            },
        }
    }

    fn to_predicate(&self) -> Predicate {
        let condition = self.clone();
        predicate(move |s| condition.holds(|key| s.get_setting(key)))
    }
}

/// Scheduling view of one manifest task, evaluated against a settings map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: String,
    pub after: Vec<String>,
    pub completed: bool,
    pub ready: bool,
}

impl Scheduled for PlannedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn after(&self) -> &[String] {
        &self.after
    }
}

impl Manifest {
    /// Parse and validate a manifest document.
    pub fn parse(contents: &str) -> Result<Self> {
        let document: toml::Value = toml::from_str(contents).context("parse manifest toml")?;
        let value = serde_json::to_value(&document).context("convert manifest to json")?;
        validate_schema(&value)?;
        let manifest: Manifest =
            serde_json::from_value(value).context("deserialize manifest")?;
        manifest.tasks().context("check task graph")?;
        Ok(manifest)
    }

    /// Build engine tasks. Conditions read session settings.
    pub fn tasks(&self) -> Result<Vec<Task>> {
        let quests = self
            .quests
            .iter()
            .map(|quest| {
                let tasks = quest.tasks.iter().map(TaskDecl::to_task).collect();
                let mut assembled = Quest::new(&quest.name, tasks);
                if let Some(completed) = &quest.completed {
                    assembled = assembled.completed(completed.to_predicate());
                }
                if let Some(ready) = &quest.ready {
                    assembled = assembled.ready(ready.to_predicate());
                }
                assembled
            })
            .collect();
        assemble(quests, self.implicit_after)
    }

    /// Scheduling entries with conditions evaluated against `settings`.
    pub fn plan(&self, settings: &BTreeMap<String, String>) -> Result<Vec<PlannedTask>> {
        let lookup = |key: &str| settings.get(key).cloned();
        let flags = self.quests.iter().flat_map(move |quest| {
            quest.tasks.iter().map(move |task| {
                let completed = quest.completed.as_ref().is_some_and(|c| c.holds(lookup))
                    || task.completed.holds(lookup);
                let ready = quest.ready.as_ref().is_none_or(|c| c.holds(lookup))
                    && task.ready.as_ref().is_none_or(|c| c.holds(lookup));
                (completed, ready)
            })
        });
        Ok(self
            .tasks()?
            .into_iter()
            .zip(flags)
            .map(|(task, (completed, ready))| PlannedTask {
                name: task.name,
                after: task.after,
                completed,
                ready,
            })
            .collect())
    }
}

impl TaskDecl {
    fn to_task(&self) -> Task {
        let mut task = Task::new(
            &self.name,
            TaskBody::Location(self.location.clone()),
            self.completed.to_predicate(),
        )
        .after(self.after.iter().cloned())
        .acquire(self.acquire.iter().map(AcquireDecl::to_request).collect::<Vec<_>>())
        .effects(self.effects.clone())
        .choices(self.choices.clone());
        if let Some(ready) = &self.ready {
            task = task.ready(ready.to_predicate());
        }
        if let Some(outfit) = &self.outfit {
            task = task.outfit(outfit.clone());
        }
        if let Some(combat) = &self.combat {
            task = task.combat(combat.clone());
        }
        if let Some(limit) = &self.limit {
            task = task.limit(limit.to_limit());
        }
        task
    }
}

impl AcquireDecl {
    fn to_request(&self) -> AcquireItem {
        let mut request = AcquireItem::new(self.item.clone()).num(self.num);
        if let Some(price) = self.price {
            request = request.price(price);
        }
        if self.optional {
            request = request.optional();
        }
        request
    }
}

impl LimitDecl {
    fn to_limit(&self) -> TaskLimit {
        TaskLimit {
            tries: self.tries,
            turns: self.turns,
            soft: self.soft,
            unready: self.unready,
            completed: self.completed,
            guard: None,
            message: self.message.clone(),
        }
    }
}

/// Load a manifest from disk.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    Manifest::parse(&contents).with_context(|| format!("load manifest {}", path.display()))
}

/// Load a flat `key = "value"` settings snapshot.
pub fn load_settings(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read settings {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse settings {}", path.display()))
}

fn validate_schema(manifest: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).context("parse manifest schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(manifest) {
        let messages = compiled
            .iter_errors(manifest)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "manifest schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
