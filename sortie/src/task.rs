//! Task and quest declarations.
//!
//! A [`Task`] is a unit of scripted work: when it can run, what it needs
//! (items, effects, outfit, combat plan) and what it does. Tasks are
//! immutable once built; the engine tracks attempts separately by name.
//! Quests group tasks under a shared name prefix and shared predicates and
//! are flattened with [`assemble`].

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use crate::core::combat::CombatStrategy;
use crate::core::delayed::Delayed;
use crate::core::invariants::validate_task_graph;
use crate::core::limit::Limit;
use crate::core::outfit::Outfit;
use crate::core::outfit_spec::OutfitSpec;
use crate::core::selector::Scheduled;
use crate::core::types::{Effect, Item, Location};
use crate::error::ConfigurationError;
use crate::io::session::{Session, SessionHook};

/// Predicate over the current session state.
pub type Predicate = Rc<dyn Fn(&dyn Session) -> bool>;

/// Second phase of a guard: checks the post-attempt state.
pub type GuardCheck = Box<dyn FnOnce(&dyn Session) -> bool>;

/// First phase of a guard: snapshots state before the attempt.
pub type GuardFactory = Rc<dyn Fn(&dyn Session) -> GuardCheck>;

pub type TaskLimit = Limit<GuardFactory>;

/// Value that may be computed from the session when the task runs.
pub type Lazy<T> = Delayed<T, dyn Session + 'static>;

/// Defer a task field until the task runs; `f` is called once per attempt.
pub fn lazy<T>(f: impl Fn(&dyn Session) -> T + 'static) -> Lazy<T> {
    Delayed::thunk(move |session: &(dyn Session + 'static)| f(session))
}

pub fn predicate(f: impl Fn(&dyn Session) -> bool + 'static) -> Predicate {
    Rc::new(f)
}

pub fn hook(f: impl Fn(&mut dyn Session) -> Result<()> + 'static) -> SessionHook {
    Rc::new(f)
}

/// Build a guard from a snapshot function and a postcondition.
pub fn guard<B: 'static>(
    before: impl Fn(&dyn Session) -> B + 'static,
    after: impl Fn(&dyn Session, B) -> bool + Clone + 'static,
) -> GuardFactory {
    Rc::new(move |session: &dyn Session| {
        let snapshot = before(session);
        let after = after.clone();
        Box::new(move |session: &dyn Session| after(session, snapshot)) as GuardCheck
    })
}

/// What the task does once it is prepared.
#[derive(Clone)]
pub enum TaskBody {
    /// Adventure once at this location.
    Location(Location),
    Callback(SessionHook),
}

impl TaskBody {
    pub fn location(&self) -> Option<&Location> {
        match self {
            TaskBody::Location(location) => Some(location),
            TaskBody::Callback(_) => None,
        }
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Location(location) => f.debug_tuple("Location").field(location).finish(),
            TaskBody::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// An item the task needs before it runs.
#[derive(Clone)]
pub struct AcquireItem {
    pub item: Item,
    /// Copies needed, counting worn copies.
    pub num: u32,
    /// Buy from a shop at no more than this price.
    pub price: Option<u32>,
    /// Missing the item is not an error.
    pub optional: bool,
    /// Skip acquisition when this returns false.
    pub useful: Option<Predicate>,
    /// Custom way to obtain the item; takes priority over everything else.
    pub get: Option<SessionHook>,
}

impl AcquireItem {
    pub fn new(item: impl Into<Item>) -> Self {
        Self {
            item: item.into(),
            num: 1,
            price: None,
            optional: false,
            useful: None,
            get: None,
        }
    }

    pub fn num(mut self, num: u32) -> Self {
        self.num = num;
        self
    }

    pub fn price(mut self, price: u32) -> Self {
        self.price = Some(price);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn useful(mut self, useful: Predicate) -> Self {
        self.useful = Some(useful);
        self
    }

    pub fn get(mut self, get: SessionHook) -> Self {
        self.get = Some(get);
        self
    }
}

impl fmt::Debug for AcquireItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquireItem")
            .field("item", &self.item)
            .field("num", &self.num)
            .field("price", &self.price)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// A task's outfit, either declarative or already solved.
#[derive(Clone, Debug)]
pub enum OutfitSource {
    Spec(OutfitSpec),
    Outfit(Outfit),
}

impl Default for OutfitSource {
    fn default() -> Self {
        OutfitSource::Spec(OutfitSpec::default())
    }
}

impl From<OutfitSpec> for OutfitSource {
    fn from(spec: OutfitSpec) -> Self {
        OutfitSource::Spec(spec)
    }
}

impl From<Outfit> for OutfitSource {
    fn from(outfit: Outfit) -> Self {
        OutfitSource::Outfit(outfit)
    }
}

#[derive(Clone)]
pub struct Task {
    pub name: String,
    /// Direct dependencies, by task name.
    pub after: Vec<String>,
    pub completed: Predicate,
    pub ready: Option<Predicate>,
    pub prepare: Option<SessionHook>,
    pub body: TaskBody,
    pub post: Option<SessionHook>,
    pub acquire: Lazy<Vec<AcquireItem>>,
    pub effects: Lazy<Vec<Effect>>,
    /// Choice adventure id to option.
    pub choices: Lazy<BTreeMap<String, String>>,
    pub limit: TaskLimit,
    pub outfit: Lazy<OutfitSource>,
    pub combat: Option<CombatStrategy>,
}

impl Task {
    pub fn new(name: impl Into<String>, body: TaskBody, completed: Predicate) -> Self {
        Self {
            name: name.into(),
            after: Vec::new(),
            completed,
            ready: None,
            prepare: None,
            body,
            post: None,
            acquire: Lazy::default(),
            effects: Lazy::default(),
            choices: Lazy::default(),
            limit: TaskLimit::default(),
            outfit: Lazy::default(),
            combat: None,
        }
    }

    pub fn after<S: Into<String>>(mut self, after: impl IntoIterator<Item = S>) -> Self {
        self.after = after.into_iter().map(Into::into).collect();
        self
    }

    pub fn ready(mut self, ready: Predicate) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn prepare(mut self, prepare: SessionHook) -> Self {
        self.prepare = Some(prepare);
        self
    }

    pub fn post(mut self, post: SessionHook) -> Self {
        self.post = Some(post);
        self
    }

    pub fn acquire(mut self, acquire: impl Into<Lazy<Vec<AcquireItem>>>) -> Self {
        self.acquire = acquire.into();
        self
    }

    pub fn effects(mut self, effects: impl Into<Lazy<Vec<Effect>>>) -> Self {
        self.effects = effects.into();
        self
    }

    pub fn choices(mut self, choices: impl Into<Lazy<BTreeMap<String, String>>>) -> Self {
        self.choices = choices.into();
        self
    }

    pub fn limit(mut self, limit: TaskLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn outfit(mut self, outfit: impl Into<OutfitSource>) -> Self {
        self.outfit = Lazy::Ready(outfit.into());
        self
    }

    /// Compute the outfit from the session each time the task runs.
    pub fn outfit_with(mut self, f: impl Fn(&dyn Session) -> OutfitSource + 'static) -> Self {
        self.outfit = lazy(f);
        self
    }

    pub fn combat(mut self, combat: CombatStrategy) -> Self {
        self.combat = Some(combat);
        self
    }

    pub fn is_completed(&self, session: &dyn Session) -> bool {
        (self.completed)(session)
    }

    pub fn is_ready(&self, session: &dyn Session) -> bool {
        self.ready.as_ref().is_none_or(|ready| ready(session))
    }
}

impl Scheduled for Task {
    fn name(&self) -> &str {
        &self.name
    }

    fn after(&self) -> &[String] {
        &self.after
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("body", &self.body)
            .field("limit", &self.limit.tries)
            .finish_non_exhaustive()
    }
}

/// A named group of tasks sharing predicates.
#[derive(Clone)]
pub struct Quest {
    pub name: String,
    pub tasks: Vec<Task>,
    /// ORed into every task's `completed`.
    pub completed: Option<Predicate>,
    /// ANDed into every task's `ready`.
    pub ready: Option<Predicate>,
}

impl Quest {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tasks,
            completed: None,
            ready: None,
        }
    }

    pub fn completed(mut self, completed: Predicate) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn ready(mut self, ready: Predicate) -> Self {
        self.ready = Some(ready);
        self
    }
}

/// Flatten quests into one task list.
///
/// Task names become `quest/task`. Dependencies without a `/` refer to tasks
/// of the same quest and are prefixed the same way. With `implicit_after`,
/// a task that declares no dependencies waits for the previous task of its
/// quest.
pub fn assemble(quests: Vec<Quest>, implicit_after: bool) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for quest in quests {
        let mut previous: Option<String> = None;
        for mut task in quest.tasks {
            task.name = format!("{}/{}", quest.name, task.name);
            task.after = task
                .after
                .iter()
                .map(|dep| qualify(&quest.name, dep))
                .collect();
            if implicit_after && task.after.is_empty() {
                task.after.extend(previous.clone());
            }

            if let Some(quest_completed) = &quest.completed {
                let quest_completed = Rc::clone(quest_completed);
                let own = Rc::clone(&task.completed);
                task.completed = predicate(move |s| quest_completed(s) || own(s));
            }
            if let Some(quest_ready) = &quest.ready {
                let quest_ready = Rc::clone(quest_ready);
                let own = task.ready.take();
                task.ready = Some(predicate(move |s| {
                    quest_ready(s) && own.as_ref().is_none_or(|own| own(s))
                }));
            }

            previous = Some(task.name.clone());
            tasks.push(task);
        }
    }

    let graph: Vec<(String, Vec<String>)> = tasks
        .iter()
        .map(|t| (t.name.clone(), t.after.clone()))
        .collect();
    let errors = validate_task_graph(&graph);
    if !errors.is_empty() {
        return Err(ConfigurationError::Invalid(errors).into());
    }
    Ok(tasks)
}

fn qualify(quest: &str, dependency: &str) -> String {
    if dependency.contains('/') {
        dependency.to_string()
    } else {
        format!("{}/{}", quest, dependency)
    }
}
