//! Combat strategies and their compilation into a single macro.
//!
//! A strategy lists, per monster, the macros and symbolic actions to run, plus
//! a monster-agnostic default. Symbolic actions are resolved at compile time:
//! first against the resources the task provides, then against caller
//! defaults. Per-monster bodies that render to identical text share one
//! conditional so the compiled macro stays within the host's size budget.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::combat_macro::Macro;
use crate::core::types::{Action, Item, Location, Monster, Skill};

/// One entry of a combat plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatStep {
    Macro(Macro),
    Action(Action),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSteps {
    pub monster: Monster,
    pub steps: Vec<CombatStep>,
}

/// Per-monster steps (in declaration order) plus default steps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatPlan {
    pub monsters: Vec<MonsterSteps>,
    pub default: Vec<CombatStep>,
}

impl CombatPlan {
    fn push(&mut self, step: CombatStep, monsters: &[Monster]) {
        if monsters.is_empty() {
            self.default.push(step);
            return;
        }
        for monster in monsters {
            match self.monsters.iter_mut().find(|m| &m.monster == monster) {
                Some(entry) => entry.steps.push(step.clone()),
                None => self.monsters.push(MonsterSteps {
                    monster: monster.clone(),
                    steps: vec![step.clone()],
                }),
            }
        }
    }

    fn steps_for(&self, monster: &Monster) -> Option<&[CombatStep]> {
        self.monsters
            .iter()
            .find(|m| &m.monster == monster)
            .map(|m| m.steps.as_slice())
    }

    fn uses(&self, action: &Action) -> bool {
        let target = CombatStep::Action(action.clone());
        self.default.contains(&target) || self.monsters.iter().any(|m| m.steps.contains(&target))
    }

    fn compile<P>(
        &self,
        resources: &CombatResources<P>,
        defaults: &CombatDefaults,
        location: Option<&Location>,
    ) -> Macro {
        let mut compressed = CompressedMacro::default();
        for entry in &self.monsters {
            let context = ActionContext::Monster(&entry.monster);
            let body = render_steps(&entry.steps, resources, defaults, context);
            compressed.add(&entry.monster, body);
        }
        let default_body = render_steps(
            &self.default,
            resources,
            defaults,
            ActionContext::Location(location),
        );
        compressed.compile().step(&default_body)
    }
}

/// A task's combat plan, cloned per execution before customization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStrategy {
    pub starting: Option<Macro>,
    #[serde(flatten)]
    pub plan: CombatPlan,
    /// Steps installed separately as the pre-round auto-attack.
    pub autoattack: CombatPlan,
}

impl CombatStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `value` before everything else, replacing any previous start.
    pub fn starting_macro(mut self, value: Macro) -> Self {
        self.starting = Some(value);
        self
    }

    /// Append a macro for `monsters`, or to the default plan if none are given.
    pub fn macro_(mut self, value: Macro, monsters: &[Monster]) -> Self {
        self.plan.push(CombatStep::Macro(value), monsters);
        self
    }

    /// Append a symbolic action for `monsters`, or to the default plan.
    pub fn action(mut self, action: impl Into<Action>, monsters: &[Monster]) -> Self {
        self.plan.push(CombatStep::Action(action.into()), monsters);
        self
    }

    pub fn autoattack(mut self, step: CombatStep, monsters: &[Monster]) -> Self {
        self.autoattack.push(step, monsters);
        self
    }

    /// In-place variant of [`CombatStrategy::macro_`] for customization hooks.
    pub fn add_macro(&mut self, value: Macro, monsters: &[Monster]) {
        self.plan.push(CombatStep::Macro(value), monsters);
    }

    pub fn add_action(&mut self, action: impl Into<Action>, monsters: &[Monster]) {
        self.plan.push(CombatStep::Action(action.into()), monsters);
    }

    /// True if any plan references `action`.
    pub fn can(&self, action: &Action) -> bool {
        self.plan.uses(action) || self.autoattack.uses(action)
    }

    /// Monsters whose own steps reference `action`.
    pub fn where_(&self, action: &Action) -> Vec<Monster> {
        let target = CombatStep::Action(action.clone());
        self.plan
            .monsters
            .iter()
            .filter(|m| m.steps.contains(&target))
            .map(|m| m.monster.clone())
            .collect()
    }

    /// Steps that would run against `monster`.
    pub fn current_strategy(&self, monster: &Monster) -> &[CombatStep] {
        self.plan
            .steps_for(monster)
            .unwrap_or(self.plan.default.as_slice())
    }

    /// Compile the starting macro, monster branches, and default body.
    pub fn compile<P>(
        &self,
        resources: &CombatResources<P>,
        defaults: &CombatDefaults,
        location: Option<&Location>,
    ) -> Macro {
        let mut result = Macro::new();
        if let Some(starting) = &self.starting {
            result = result.step(starting);
        }
        result.step(&self.plan.compile(resources, defaults, location))
    }

    pub fn compile_autoattack<P>(
        &self,
        resources: &CombatResources<P>,
        defaults: &CombatDefaults,
        location: Option<&Location>,
    ) -> Macro {
        self.autoattack.compile(resources, defaults, location)
    }
}

fn render_steps<P>(
    steps: &[CombatStep],
    resources: &CombatResources<P>,
    defaults: &CombatDefaults,
    context: ActionContext<'_>,
) -> Macro {
    steps.iter().fold(Macro::new(), |acc, step| match step {
        CombatStep::Macro(m) => acc.step(m),
        CombatStep::Action(action) => match resolve_action(action, resources, defaults, context) {
            Some(m) => acc.step(&m),
            None => acc,
        },
    })
}

fn resolve_action<P>(
    action: &Action,
    resources: &CombatResources<P>,
    defaults: &CombatDefaults,
    context: ActionContext<'_>,
) -> Option<Macro> {
    resources
        .macro_for(action)
        .or_else(|| defaults.generate(action, context))
}

/// Groups monsters by the rendered text of their bodies.
#[derive(Default)]
struct CompressedMacro {
    groups: Vec<(String, Macro, Vec<Monster>)>,
}

impl CompressedMacro {
    fn add(&mut self, monster: &Monster, body: Macro) {
        let text = body.to_string();
        if text.is_empty() {
            return;
        }
        match self.groups.iter_mut().find(|(key, _, _)| *key == text) {
            Some((_, _, monsters)) => monsters.push(monster.clone()),
            None => self.groups.push((text, body, vec![monster.clone()])),
        }
    }

    fn compile(&self) -> Macro {
        self.groups
            .iter()
            .fold(Macro::new(), |acc, (_, body, monsters)| {
                let condition = monsters
                    .iter()
                    .map(Macro::monster_condition)
                    .collect::<Vec<_>>()
                    .join(" || ");
                acc.if_(&condition, body)
            })
    }
}

/// What a provided resource does when its action fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceUse {
    Item(Item),
    Skill(Skill),
    Macro(Macro),
}

impl ResourceUse {
    pub fn to_macro(&self) -> Macro {
        match self {
            ResourceUse::Item(item) => Macro::new().item(item),
            ResourceUse::Skill(skill) => Macro::new().skill(skill),
            ResourceUse::Macro(m) => m.clone(),
        }
    }
}

/// A concrete way to perform a symbolic action, with an optional preparation
/// step of type `P` run before the task body.
#[derive(Clone)]
pub struct CombatResource<P> {
    pub prepare: Option<P>,
    pub use_: ResourceUse,
}

impl<P> CombatResource<P> {
    pub fn new(use_: ResourceUse) -> Self {
        Self {
            prepare: None,
            use_,
        }
    }

    pub fn with_prepare(mut self, prepare: P) -> Self {
        self.prepare = Some(prepare);
        self
    }
}

impl<P> fmt::Debug for CombatResource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatResource")
            .field("use_", &self.use_)
            .field("prepare", &self.prepare.is_some())
            .finish()
    }
}

/// Resources provided for one task execution, keyed by action.
pub struct CombatResources<P> {
    resources: BTreeMap<Action, CombatResource<P>>,
}

impl<P> Default for CombatResources<P> {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }
}

impl<P> CombatResources<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&mut self, action: impl Into<Action>, resource: CombatResource<P>) {
        self.resources.insert(action.into(), resource);
    }

    pub fn all(&self) -> impl Iterator<Item = &CombatResource<P>> {
        self.resources.values()
    }

    pub fn macro_for(&self, action: &Action) -> Option<Macro> {
        self.resources.get(action).map(|r| r.use_.to_macro())
    }
}

/// Context handed to a default generator.
#[derive(Clone, Copy, Debug)]
pub enum ActionContext<'a> {
    /// The action appears in this monster's steps.
    Monster(&'a Monster),
    /// The action appears in the default steps at this location.
    Location(Option<&'a Location>),
}

type Generator = Rc<dyn Fn(ActionContext<'_>) -> Macro>;

/// Fallback macros for actions a task did not provide resources for.
#[derive(Clone, Default)]
pub struct CombatDefaults {
    generators: BTreeMap<Action, Generator>,
}

impl CombatDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        action: impl Into<Action>,
        generator: impl Fn(ActionContext<'_>) -> Macro + 'static,
    ) -> Self {
        self.generators.insert(action.into(), Rc::new(generator));
        self
    }

    fn generate(&self, action: &Action, context: ActionContext<'_>) -> Option<Macro> {
        self.generators.get(action).map(|g| g(context))
    }
}

impl fmt::Debug for CombatDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.generators.keys()).finish()
    }
}
