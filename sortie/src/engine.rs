//! Task scheduler and execution pipeline.
//!
//! The [`Engine`] owns the session, the task list and all run state (attempt
//! counters, the last installed macros, setting overrides). Each
//! [`Engine::execute`] call prepares one task (items, effects, outfit,
//! combat macro), runs its body, and checks its limits if it did not finish.
//! Side effects are not rolled back when a step fails.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::acquire::{acquire_items, ensure_effects};
use crate::core::combat::{CombatDefaults, CombatResources, CombatStrategy};
use crate::core::limit::{Observation, check_limits};
use crate::core::outfit::Outfit;
use crate::core::selector::{is_available, next_available};
use crate::core::wanderers::{LastAdventure, WandererTable};
use crate::dress::dress;
use crate::error::EquipFailure;
use crate::io::config::EngineConfig;
use crate::io::session::{Session, SessionHook};
use crate::io::settings::{PropertyOverrides, startup_settings};
use crate::task::{OutfitSource, Task, TaskBody};

/// Resources a customization hook may hand to the combat compiler.
pub type TaskResources = CombatResources<SessionHook>;

/// Per-task adjustments applied after the outfit is solved and before it is
/// committed.
pub trait Customize {
    fn customize(
        &self,
        session: &dyn Session,
        task: &Task,
        outfit: &mut Outfit,
        combat: &mut CombatStrategy,
        resources: &mut TaskResources,
    ) -> Result<()>;
}

impl<F> Customize for F
where
    F: Fn(&dyn Session, &Task, &mut Outfit, &mut CombatStrategy, &mut TaskResources) -> Result<()>,
{
    fn customize(
        &self,
        session: &dyn Session,
        task: &Task,
        outfit: &mut Outfit,
        combat: &mut CombatStrategy,
        resources: &mut TaskResources,
    ) -> Result<()> {
        self(session, task, outfit, combat, resources)
    }
}

/// How a [`Engine::run`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Tasks executed during this call.
    pub executed: u32,
    /// True if no task was available at the end; false if the budget ran out.
    pub complete: bool,
}

pub struct Engine<S: Session + 'static> {
    session: S,
    tasks: Vec<Task>,
    config: EngineConfig,
    wanderers: WandererTable,
    defaults: CombatDefaults,
    customize: Option<Box<dyn Customize>>,
    attempts: BTreeMap<String, u32>,
    overrides: PropertyOverrides,
    installed_macro: Option<String>,
    installed_autoattack: Option<String>,
}

impl<S: Session + 'static> Engine<S> {
    /// Build an engine and apply the startup setting overrides.
    pub fn new(mut session: S, tasks: Vec<Task>, config: EngineConfig) -> Result<Self> {
        config.validate().context("engine config")?;
        let mut overrides = PropertyOverrides::new();
        let settings = startup_settings(config.combat_script.as_deref(), &config.settings);
        overrides
            .set_all(&mut session, &settings)
            .context("apply startup settings")?;

        let mut wanderers = WandererTable::builtin();
        wanderers.extend(&config.wanderers);

        Ok(Self {
            session,
            tasks,
            config,
            wanderers,
            defaults: CombatDefaults::default(),
            customize: None,
            attempts: BTreeMap::new(),
            overrides,
            installed_macro: None,
            installed_autoattack: None,
        })
    }

    pub fn with_defaults(mut self, defaults: CombatDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_customize(mut self, customize: impl Customize + 'static) -> Self {
        self.customize = Some(Box::new(customize));
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Attempts recorded for `task` during this engine's lifetime.
    pub fn attempts(&self, task: &str) -> u32 {
        self.attempts.get(task).copied().unwrap_or(0)
    }

    pub fn available(&self, task: &Task) -> Result<bool> {
        let session: &dyn Session = &self.session;
        Ok(is_available(
            &self.tasks,
            task,
            &|t: &Task| t.is_completed(session),
            &|t: &Task| t.is_ready(session),
        )?)
    }

    pub fn get_next_task(&self) -> Result<Option<&Task>> {
        let session: &dyn Session = &self.session;
        Ok(next_available(
            &self.tasks,
            |t: &Task| t.is_completed(session),
            |t: &Task| t.is_ready(session),
        )?)
    }

    /// Execute tasks until none is available or `max_actions` have run.
    pub fn run(&mut self, max_actions: Option<u32>) -> Result<RunOutcome> {
        let mut executed = 0;
        loop {
            if max_actions.is_some_and(|max| executed >= max) {
                info!(executed, "action budget exhausted");
                return Ok(RunOutcome {
                    executed,
                    complete: false,
                });
            }
            let Some(task) = self.get_next_task()?.cloned() else {
                info!(executed, "no task available");
                return Ok(RunOutcome {
                    executed,
                    complete: true,
                });
            };
            self.execute(&task)?;
            executed += 1;
        }
    }

    /// Run one attempt of `task`.
    ///
    /// The attempt counter is bumped exactly once, whether or not a step
    /// fails. Limits are only checked when the task is still incomplete.
    #[instrument(skip_all, fields(task = %task.name))]
    pub fn execute(&mut self, task: &Task) -> Result<()> {
        let guard = task
            .limit
            .guard
            .as_ref()
            .map(|factory| factory(&self.session));

        let result = self.attempt(task);
        let attempts = {
            let counter = self.attempts.entry(task.name.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        result?;

        if task.is_completed(&self.session) {
            debug!(attempts, "task completed");
            return Ok(());
        }

        let observed = Observation {
            attempts,
            turns_spent: task.body.location().map(|l| self.session.turns_spent(l)),
            still_ready: task.is_ready(&self.session),
            guard_passed: guard.map(|check| check(&self.session)),
        };
        check_limits(&task.name, &task.limit, &observed)?;
        Ok(())
    }

    fn attempt(&mut self, task: &Task) -> Result<()> {
        let items = task.acquire.resolve(&self.session);
        acquire_items(&mut self.session, &task.name, &items)?;

        let effects = task.effects.resolve(&self.session);
        let song_limit = self.song_limit();
        ensure_effects(&mut self.session, &task.name, &effects, song_limit)?;

        let mut outfit = self.solve_outfit(task)?;
        let mut combat = task.combat.clone().unwrap_or_default();
        let mut resources = TaskResources::new();
        if let Some(customize) = &self.customize {
            customize
                .customize(&self.session, task, &mut outfit, &mut combat, &mut resources)
                .with_context(|| format!("customize {}", task.name))?;
        }
        dress(&mut self.session, &task.name, &outfit)?;

        self.install_combat(task, &combat, &resources)?;
        let choices = task.choices.resolve(&self.session);
        for (id, option) in &choices {
            self.overrides
                .set(&mut self.session, &format!("choiceAdventure{}", id), option)?;
        }

        for resource in resources.all() {
            if let Some(prepare) = &resource.prepare {
                prepare(&mut self.session).context("combat resource prepare")?;
            }
        }
        if let Some(prepare) = &task.prepare {
            prepare(&mut self.session).with_context(|| format!("prepare {}", task.name))?;
        }

        loop {
            self.run_body(task)?;
            if !self.wandered(task) {
                break;
            }
            debug!("wandering noncombat, repeating body");
        }

        if let Some(post) = &task.post {
            post(&mut self.session).with_context(|| format!("post {}", task.name))?;
        }
        Ok(())
    }

    fn song_limit(&self) -> usize {
        let bonus = self
            .config
            .extra_song_skill
            .as_ref()
            .is_some_and(|skill| self.session.has_skill(skill));
        self.config.song_limit + usize::from(bonus)
    }

    fn solve_outfit(&self, task: &Task) -> Result<Outfit> {
        match task.outfit.resolve(&self.session) {
            OutfitSource::Outfit(outfit) => Ok(outfit),
            OutfitSource::Spec(spec) => {
                let mut outfit = Outfit::new();
                if let Err(reason) = outfit.try_equip(&self.session, spec, None) {
                    if !self.config.allow_partial_outfits {
                        return Err(EquipFailure {
                            task: task.name.clone(),
                            reason: reason.to_string(),
                        }
                        .into());
                    }
                    warn!(%reason, "continuing with partial outfit");
                }
                Ok(outfit)
            }
        }
    }

    /// Compile and install the macros, skipping writes of unchanged text.
    fn install_combat(
        &mut self,
        task: &Task,
        combat: &CombatStrategy,
        resources: &TaskResources,
    ) -> Result<()> {
        let location = task.body.location();
        let text = combat.compile(resources, &self.defaults, location).to_string();
        if self.installed_macro.as_deref() != Some(text.as_str()) {
            debug!(macro_text = %text, "installing macro");
            self.session.install_macro(&text)?;
            self.installed_macro = Some(text);
        }

        let autoattack = combat
            .compile_autoattack(resources, &self.defaults, location)
            .to_string();
        if self.installed_autoattack.as_deref() != Some(autoattack.as_str()) {
            self.session.install_autoattack(&autoattack)?;
            self.installed_autoattack = Some(autoattack);
        }
        Ok(())
    }

    fn run_body(&mut self, task: &Task) -> Result<()> {
        match &task.body {
            TaskBody::Location(location) => self
                .session
                .adventure(location)
                .with_context(|| format!("adventure at {}", location)),
            TaskBody::Callback(body) => {
                body(&mut self.session).with_context(|| format!("run {}", task.name))
            }
        }
    }

    /// True if a location body just hit a wandering noncombat.
    fn wandered(&self, task: &Task) -> bool {
        if task.body.location().is_none() {
            return false;
        }
        let encounter = self.session.last_encounter();
        let location = self.session.last_location();
        let environment = location
            .as_ref()
            .and_then(|l| self.session.location_environment(l));
        self.wanderers.is_wanderer(&LastAdventure {
            encounter: encounter.as_deref(),
            location: location.as_ref(),
            environment: environment.as_deref(),
        })
    }

    /// Restore overridden settings and forget all run state.
    pub fn teardown(&mut self) -> Result<()> {
        self.overrides
            .reset_all(&mut self.session)
            .context("restore settings")?;
        self.installed_macro = None;
        self.installed_autoattack = None;
        self.attempts.clear();
        Ok(())
    }

    pub fn into_session(self) -> S {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeSession, flag_task};

    #[test]
    fn startup_settings_are_applied_and_restored() {
        let session = FakeSession::new().with_setting("hpAutoRecovery", "0.7");
        let config = EngineConfig {
            combat_script: Some("sortie".to_string()),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(session, Vec::new(), config).expect("engine");
        assert_eq!(
            engine.session().get_setting("customCombatScript").as_deref(),
            Some("sortie")
        );
        assert_eq!(
            engine.session().get_setting("hpAutoRecovery").as_deref(),
            Some("-0.05")
        );

        engine.teardown().expect("teardown");
        assert_eq!(
            engine.session().get_setting("hpAutoRecovery").as_deref(),
            Some("0.7")
        );
    }

    #[test]
    fn unchanged_macro_is_installed_once() {
        let tasks = vec![flag_task("a"), flag_task("b")];
        let mut engine =
            Engine::new(FakeSession::new(), tasks, EngineConfig::default()).expect("engine");
        let outcome = engine.run(None).expect("run");
        assert_eq!(
            outcome,
            RunOutcome {
                executed: 2,
                complete: true
            }
        );
        assert_eq!(engine.session().calls("macro").len(), 1);
        assert_eq!(engine.session().calls("autoattack").len(), 1);
    }

    #[test]
    fn song_cap_grows_with_extra_skill() {
        let config = EngineConfig {
            extra_song_skill: Some(crate::core::types::Skill::new("Mariachi Memory")),
            ..EngineConfig::default()
        };
        let session = FakeSession::new().with_skill("Mariachi Memory");
        let engine = Engine::new(session, Vec::new(), config).expect("engine");
        assert_eq!(engine.song_limit(), 4);
    }

    #[test]
    fn partial_outfits_can_be_tolerated() {
        use crate::core::outfit_spec::OutfitSpec;
        use crate::core::types::{Item, Slot};

        let spec = OutfitSpec::new().with_slot(Slot::Hat, Item::new("missing hat"));
        let strict_task = flag_task("strict").outfit(spec.clone());
        let mut strict =
            Engine::new(FakeSession::new(), vec![strict_task.clone()], EngineConfig::default())
                .expect("engine");
        let err = strict.execute(&strict_task).expect_err("equip failure");
        assert!(err.downcast_ref::<EquipFailure>().is_some());
        assert_eq!(strict.attempts("strict"), 1);

        let config = EngineConfig {
            allow_partial_outfits: true,
            ..EngineConfig::default()
        };
        let mut lenient =
            Engine::new(FakeSession::new(), vec![strict_task.clone()], config).expect("engine");
        lenient.execute(&strict_task).expect("tolerated");
    }
}
