//! End-to-end engine scenarios against the in-memory session.
//!
//! Each test builds a small task list, drives `Engine::execute` or
//! `Engine::run`, and inspects the fake session's state and call log.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use sortie::core::combat::{CombatResource, CombatStrategy, ResourceUse};
use sortie::core::inventory::Inventory;
use sortie::core::outfit_spec::OutfitSpec;
use sortie::core::types::{Effect, Item, Location, Slot};
use sortie::engine::{Engine, RunOutcome};
use sortie::error::{ConfigurationError, LimitExceeded, LimitKind};
use sortie::io::config::EngineConfig;
use sortie::io::session::Session;
use sortie::task::{
    AcquireItem, OutfitSource, Task, TaskBody, TaskLimit, guard, hook, lazy, predicate,
};
use sortie::test_support::{FakeSession, flag_task, set_flag, stubborn_task};

fn engine(session: FakeSession, tasks: Vec<Task>) -> Engine<FakeSession> {
    Engine::new(session, tasks, EngineConfig::default()).expect("engine")
}

fn next_name(engine: &Engine<FakeSession>) -> Option<String> {
    engine
        .get_next_task()
        .expect("select")
        .map(|task| task.name.clone())
}

#[test]
fn dependency_waits_for_its_prerequisite() {
    let tasks = vec![flag_task("A").after(["B"]), flag_task("B")];
    let mut engine = engine(FakeSession::new(), tasks);
    assert_eq!(next_name(&engine).as_deref(), Some("B"));

    let b = engine.tasks()[1].clone();
    engine.execute(&b).expect("execute B");
    assert_eq!(next_name(&engine).as_deref(), Some("A"));
}

#[test]
fn dependencies_are_not_transitive() {
    let tasks = vec![
        flag_task("A").after(["B"]),
        flag_task("B").after(["C"]),
        flag_task("C"),
    ];
    let session = FakeSession::new().with_setting("done.B", "true");
    let engine = engine(session, tasks);
    let a = &engine.tasks()[0];
    assert!(engine.available(a).expect("available"));
    assert_eq!(next_name(&engine).as_deref(), Some("A"));
}

#[test]
fn completed_tasks_are_never_available() {
    let session = FakeSession::new().with_setting("done.A", "true");
    let engine = engine(session, vec![flag_task("A")]);
    assert!(!engine.available(&engine.tasks()[0]).expect("available"));
    assert_eq!(next_name(&engine), None);
}

#[test]
fn unknown_dependency_is_fatal() {
    let engine = engine(FakeSession::new(), vec![flag_task("A").after(["ghost"])]);
    let err = engine.get_next_task().expect_err("unknown dependency");
    assert_eq!(
        err.downcast_ref::<ConfigurationError>(),
        Some(&ConfigurationError::UnknownDependency {
            task: "A".to_string(),
            dependency: "ghost".to_string(),
        })
    );
}

#[test]
fn too_many_songs_fail_before_any_effect() {
    let session = FakeSession::new()
        .with_song("Ode")
        .with_song("Polka")
        .with_song("Madrigal")
        .with_song("Ballad");
    let effects: Vec<Effect> = ["Ode", "Polka", "Madrigal", "Ballad"]
        .into_iter()
        .map(Effect::new)
        .collect();
    let task = flag_task("sing").effects(effects);
    let mut engine = engine(session, vec![task.clone()]);

    let err = engine.execute(&task).expect_err("song cap");
    assert!(err.to_string().contains("too many songs"));
    assert!(engine.session().calls("ensure").is_empty());
    assert!(engine.session().calls("shrug").is_empty());
    assert_eq!(engine.attempts("sing"), 1);
}

#[test]
fn worn_accessory_stays_while_new_one_is_added() {
    let session = FakeSession::new()
        .with_gear("lucky ring", Slot::Acc1, 1)
        .with_gear("amulet", Slot::Acc1, 1)
        .wearing(Slot::Acc2, "lucky ring");
    let spec = OutfitSpec::new()
        .with_equip(Item::new("lucky ring"))
        .with_equip(Item::new("amulet"));
    let task = flag_task("dress").outfit(spec);
    let mut engine = engine(session, vec![task.clone()]);

    engine.execute(&task).expect("execute");
    let session = engine.session();
    assert_eq!(session.worn(Slot::Acc2), Some(Item::new("lucky ring")));
    let amulet = Some(Item::new("amulet"));
    assert!(session.worn(Slot::Acc1) == amulet || session.worn(Slot::Acc3) == amulet);
    assert!(
        session
            .calls("equip")
            .iter()
            .all(|call| !call.starts_with("equip acc2"))
    );
}

#[test]
fn tries_limit_trips_on_third_attempt() {
    let task = stubborn_task("grind").limit(TaskLimit::tries(3));
    let mut engine = engine(FakeSession::new(), vec![task.clone()]);

    engine.execute(&task).expect("first");
    engine.execute(&task).expect("second");
    let err = engine.execute(&task).expect_err("third");
    assert!(
        err.to_string()
            .contains("did not complete within 3 attempts")
    );
    assert_eq!(engine.attempts("grind"), 3);
}

#[test]
fn failing_body_still_counts_one_attempt() {
    let task = Task::new(
        "boom",
        TaskBody::Callback(hook(|_| Err(anyhow::anyhow!("body failed")))),
        predicate(|_| false),
    )
    .post(set_flag("post.ran"));
    let mut engine = engine(FakeSession::new(), vec![task.clone()]);

    let err = engine.execute(&task).expect_err("body error");
    assert!(format!("{:#}", err).contains("body failed"));
    assert_eq!(engine.attempts("boom"), 1);
    assert_eq!(engine.session().get_setting("post.ran"), None);
}

#[test]
fn wandering_noncombat_repeats_body_once_per_wanderer() {
    let session = FakeSession::new()
        .with_environment("Meadow", "outdoor")
        .with_encounters(["Bath Time", "Summer Days", "meadow fight"]);
    let task = Task::new(
        "meadow",
        TaskBody::Location(Location::new("Meadow")),
        predicate(|_| false),
    )
    .post(set_flag("post.ran"));
    let mut engine = engine(session, vec![task.clone()]);

    engine.execute(&task).expect("execute");
    let session = engine.session();
    assert_eq!(session.calls("adventure").len(), 3);
    assert_eq!(session.calls("macro").len(), 1);
    assert_eq!(session.get_setting("post.ran").as_deref(), Some("true"));
    assert_eq!(engine.attempts("meadow"), 1);
}

#[test]
fn callback_bodies_do_not_repeat_on_wanderers() {
    let mut session = FakeSession::new().with_environment("Meadow", "outdoor");
    session.last_encounter = Some("Bath Time".to_string());
    session.last_location = Some(Location::new("Meadow"));
    let task = flag_task("callback");
    let mut engine = engine(session, vec![task.clone()]);

    engine.execute(&task).expect("execute");
    assert!(engine.session().calls("adventure").is_empty());
    assert_eq!(engine.attempts("callback"), 1);
}

#[test]
fn turns_limit_uses_location_turn_counter() {
    let task = Task::new(
        "cave",
        TaskBody::Location(Location::new("Cave")),
        predicate(|_| false),
    )
    .limit(TaskLimit::turns(2));
    let mut engine = engine(FakeSession::new(), vec![task.clone()]);

    engine.execute(&task).expect("first turn");
    let err = engine.execute(&task).expect_err("second turn");
    let limit = err.downcast_ref::<LimitExceeded>().expect("limit");
    assert_eq!(limit.kind, LimitKind::Turns(2));
}

#[test]
fn guard_compares_state_across_the_attempt() {
    let counter = guard(
        |s: &dyn Session| s.get_setting("progress"),
        |s: &dyn Session, before: Option<String>| s.get_setting("progress") != before,
    );
    let task = stubborn_task("stall").limit(TaskLimit::default().with_guard(counter));
    let mut engine = engine(FakeSession::new(), vec![task.clone()]);

    let err = engine.execute(&task).expect_err("guard");
    let limit = err.downcast_ref::<LimitExceeded>().expect("limit");
    assert_eq!(limit.kind, LimitKind::Guard);
}

#[test]
fn customize_provides_resources_and_prepare_hooks() {
    let strategy = CombatStrategy::new().action("kill", &[]);
    let task = Task::new(
        "hunt",
        TaskBody::Location(Location::new("Woods")),
        predicate(|_| false),
    )
    .combat(strategy);
    let use_ = ResourceUse::Item(Item::new("seal tooth"));
    let expected = use_.to_macro().to_string();
    let mut engine = engine(FakeSession::new(), vec![task.clone()]).with_customize(
        move |_: &dyn Session,
              _: &Task,
              _: &mut sortie::core::outfit::Outfit,
              _: &mut CombatStrategy,
              resources: &mut sortie::engine::TaskResources|
              -> anyhow::Result<()> {
            resources.provide(
                "kill",
                CombatResource::new(use_.clone()).with_prepare(set_flag("resource.ready")),
            );
            Ok(())
        },
    );

    engine.execute(&task).expect("execute");
    let session = engine.session();
    assert_eq!(session.macro_text.as_deref(), Some(expected.as_str()));
    assert_eq!(
        session.get_setting("resource.ready").as_deref(),
        Some("true")
    );
}

#[test]
fn run_respects_action_budget() {
    let tasks = vec![flag_task("a"), flag_task("b")];
    let mut engine = engine(FakeSession::new(), tasks);
    let outcome = engine.run(Some(1)).expect("run");
    assert_eq!(
        outcome,
        RunOutcome {
            executed: 1,
            complete: false
        }
    );
    let outcome = engine.run(None).expect("run");
    assert_eq!(
        outcome,
        RunOutcome {
            executed: 1,
            complete: true
        }
    );
}

#[test]
fn teardown_restores_choice_overrides() {
    let mut choices = BTreeMap::new();
    choices.insert("502".to_string(), "2".to_string());
    let task = flag_task("choose").choices(choices);
    let session = FakeSession::new().with_setting("choiceAdventure502", "1");
    let mut engine = engine(session, vec![task.clone()]);

    engine.execute(&task).expect("execute");
    assert_eq!(
        engine.session().get_setting("choiceAdventure502").as_deref(),
        Some("2")
    );
    engine.teardown().expect("teardown");
    assert_eq!(
        engine.session().get_setting("choiceAdventure502").as_deref(),
        Some("1")
    );
    assert_eq!(engine.attempts("choose"), 0);
}

fn counted<T>(calls: Rc<Cell<u32>>, value: T) -> impl Fn(&dyn Session) -> T + 'static
where
    T: Clone + 'static,
{
    move |_: &dyn Session| {
        calls.set(calls.get() + 1);
        value.clone()
    }
}

#[test]
fn deferred_fields_resolve_once_per_execute() {
    let acquire = Rc::new(Cell::new(0));
    let effects = Rc::new(Cell::new(0));
    let choices = Rc::new(Cell::new(0));
    let outfit = Rc::new(Cell::new(0));

    let session = FakeSession::new()
        .with_gear("helmet", Slot::Hat, 1)
        .with_item("torch", 1)
        .with_setting("wantHelmet", "true");
    let outfit_calls = Rc::clone(&outfit);
    let task = flag_task("deferred")
        .acquire(lazy(counted(Rc::clone(&acquire), vec![AcquireItem::new("torch")])))
        .effects(lazy(counted(Rc::clone(&effects), vec![Effect::new("Shielded")])))
        .choices(lazy(counted(
            Rc::clone(&choices),
            BTreeMap::from([("7".to_string(), "1".to_string())]),
        )))
        .outfit_with(move |s: &dyn Session| {
            outfit_calls.set(outfit_calls.get() + 1);
            if s.get_setting("wantHelmet").is_some() {
                OutfitSource::from(OutfitSpec::new().with_slot(Slot::Hat, Item::new("helmet")))
            } else {
                OutfitSource::default()
            }
        });
    let mut engine = engine(session, vec![task.clone()]);

    engine.execute(&task).expect("first");
    for calls in [&acquire, &effects, &choices, &outfit] {
        assert_eq!(calls.get(), 1);
    }
    let session = engine.session();
    assert_eq!(session.worn(Slot::Hat), Some(Item::new("helmet")));
    assert!(session.active_effects().contains(&Effect::new("Shielded")));
    assert_eq!(
        session.get_setting("choiceAdventure7").as_deref(),
        Some("1")
    );

    engine.execute(&task).expect("second");
    for calls in [&acquire, &effects, &choices, &outfit] {
        assert_eq!(calls.get(), 2);
    }
}
