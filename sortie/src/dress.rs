//! Commit a solved [`Outfit`] to the session.
//!
//! Order matters: items that move between slots are taken off first so the
//! later equips can find them, accessories already worn stay where they are,
//! and the maximizer only fills slots the plan left open. A final pass reads
//! the session back and fails loudly if anything did not stick.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::outfit::Outfit;
use crate::core::types::{Item, Slot};
use crate::error::{DressExpectation, DressVerificationFailure, MaximizationFailure};
use crate::io::session::{MaximizeRequest, Session};

#[instrument(skip_all, fields(task = %task))]
pub fn dress(session: &mut dyn Session, task: &str, outfit: &Outfit) -> Result<()> {
    for hook in outfit.before_dress_hooks() {
        hook(&mut *session).context("before-dress hook")?;
    }

    let active = session.active_familiar();
    if let Some(familiar) = outfit.familiar().filter(|f| active.as_ref() != Some(*f)) {
        debug!(familiar = %familiar, "switching familiar");
        session.use_familiar(familiar)?;
    }

    remove_conflicts(session, outfit)?;

    for slot in Slot::NON_ACCESSORY {
        let Some(target) = outfit.get(slot) else {
            continue;
        };
        let worn = session.worn(slot);
        if target.is_none() {
            if worn.is_some() {
                session.equip(slot, None)?;
            }
        } else if worn.as_ref() != Some(target) {
            session
                .equip(slot, Some(target))
                .with_context(|| format!("equip {} in {}", target, slot))?;
        }
    }

    equip_accessories(session, task, outfit)?;

    if !outfit.modifier().is_empty() {
        maximize(session, task, outfit)?;
    }

    for (class, setting) in outfit.modes().iter() {
        session.apply_mode(class, setting)?;
    }

    for (rider, familiar) in outfit.riders() {
        let carrier = session.rider_carrier(*rider);
        if session.worn_count(&carrier) == 0 {
            debug!(rider = %rider, carrier = %carrier, "carrier not worn, skipping rider");
            continue;
        }
        if session.rider(*rider).as_ref() == Some(familiar) {
            continue;
        }
        if session.rider(rider.other()).as_ref() == Some(familiar) {
            session.set_rider(rider.other(), None)?;
        }
        session.set_rider(*rider, Some(familiar))?;
    }

    verify(session, task, outfit)?;

    for hook in outfit.after_dress_hooks() {
        hook(&mut *session).context("after-dress hook")?;
    }
    Ok(())
}

/// Take off anything that would block the planned assignment.
fn remove_conflicts(session: &mut dyn Session, outfit: &Outfit) -> Result<()> {
    let mut wanted = accessory_targets(outfit);
    for slot in Slot::ACCESSORIES {
        let Some(worn) = session.worn(slot) else {
            continue;
        };
        let keep = match wanted.get_mut(&worn) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        };
        let needed_elsewhere = outfit
            .equips()
            .iter()
            .any(|(s, item)| !s.is_accessory() && *item == worn);
        if outfit.avoid().contains(&worn) || (!keep && needed_elsewhere) {
            debug!(slot = %slot, item = %worn, "removing");
            session.equip(slot, None)?;
        }
    }

    for slot in Slot::NON_ACCESSORY {
        let Some(worn) = session.worn(slot) else {
            continue;
        };
        let planned_here = outfit.get(slot) == Some(&worn);
        let planned_elsewhere = outfit
            .equips()
            .iter()
            .any(|(s, item)| *s != slot && *item == worn);
        if outfit.avoid().contains(&worn) || (!planned_here && planned_elsewhere) {
            debug!(slot = %slot, item = %worn, "removing");
            session.equip(slot, None)?;
        }
    }

    let wants_offhand = outfit.get(Slot::OffHand).is_some_and(|item| !item.is_none());
    let blocking = session
        .worn(Slot::Weapon)
        .filter(|weapon| session.weapon_hands(weapon) >= 2);
    if let Some(weapon) = blocking.filter(|_| wants_offhand && outfit.get(Slot::Weapon).is_none()) {
        debug!(weapon = %weapon, "removing two-handed weapon for off-hand");
        session.equip(Slot::Weapon, None)?;
    }
    Ok(())
}

fn accessory_targets(outfit: &Outfit) -> BTreeMap<Item, u32> {
    let mut targets = BTreeMap::new();
    for slot in Slot::ACCESSORIES {
        if let Some(item) = outfit.get(slot).filter(|item| !item.is_none()) {
            *targets.entry(item.clone()).or_insert(0) += 1;
        }
    }
    targets
}

/// Place accessories, leaving already-worn targets in their slots.
fn equip_accessories(session: &mut dyn Session, task: &str, outfit: &Outfit) -> Result<()> {
    let reserved: Vec<Slot> = Slot::ACCESSORIES
        .into_iter()
        .filter(|slot| outfit.get(*slot).is_some_and(Item::is_none))
        .collect();

    let mut outstanding = accessory_targets(outfit);
    let mut settled = Vec::new();
    for slot in Slot::ACCESSORIES {
        if reserved.contains(&slot) {
            continue;
        }
        let Some(worn) = session.worn(slot) else {
            continue;
        };
        match outstanding.get_mut(&worn) {
            Some(count) if *count > 0 => {
                *count -= 1;
                settled.push(slot);
            }
            _ => {}
        }
    }

    for slot in &reserved {
        if session.worn(*slot).is_some() {
            session.equip(*slot, None)?;
        }
    }

    for (item, count) in outstanding {
        for _ in 0..count {
            let free = Slot::ACCESSORIES
                .into_iter()
                .find(|slot| !settled.contains(slot) && !reserved.contains(slot));
            let Some(slot) = free else {
                return Err(DressVerificationFailure {
                    task: task.to_string(),
                    expected: DressExpectation::AccessorySlotsExhausted { item },
                }
                .into());
            };
            session
                .equip(slot, Some(&item))
                .with_context(|| format!("equip {} in {}", item, slot))?;
            settled.push(slot);
        }
    }
    Ok(())
}

/// Fill the remaining slots, refreshing inventory and retrying once on failure.
fn maximize(session: &mut dyn Session, task: &str, outfit: &Outfit) -> Result<()> {
    let request = MaximizeRequest {
        goals: outfit.modifier().to_vec(),
        used_slots: outfit.equips().keys().copied().collect(),
        avoid: outfit.avoid().to_vec(),
        modes: outfit.modes().clone(),
        bonuses: outfit.bonuses().clone(),
    };
    info!(expression = %request.expression(), "maximizing");
    if session.maximize(&request)? {
        return Ok(());
    }

    warn!("maximizer failed, refreshing inventory and retrying");
    session.refresh_inventory()?;
    if session.maximize(&request)? {
        return Ok(());
    }
    Err(MaximizationFailure {
        task: task.to_string(),
        goals: request.goals,
    }
    .into())
}

fn verify(session: &dyn Session, task: &str, outfit: &Outfit) -> Result<()> {
    let fail = |expected| -> Result<()> {
        Err(DressVerificationFailure {
            task: task.to_string(),
            expected,
        }
        .into())
    };

    if let Some(familiar) = outfit.familiar() {
        let active = session.active_familiar();
        let matches = if familiar.is_none() {
            active.is_none()
        } else {
            active.as_ref() == Some(familiar)
        };
        if !matches {
            return fail(DressExpectation::Familiar(familiar.clone()));
        }
    }

    for slot in Slot::NON_ACCESSORY {
        let Some(target) = outfit.get(slot) else {
            continue;
        };
        let worn = session.worn(slot);
        let matches = if target.is_none() {
            worn.is_none()
        } else {
            worn.as_ref() == Some(target)
        };
        if !matches {
            return fail(DressExpectation::Slot {
                slot,
                item: target.clone(),
            });
        }
    }

    for (item, count) in accessory_targets(outfit) {
        let worn = Slot::ACCESSORIES
            .into_iter()
            .filter(|slot| session.worn(*slot).as_ref() == Some(&item))
            .count() as u32;
        if worn < count {
            return fail(DressExpectation::Accessory { item, count });
        }
    }

    for (rider, familiar) in outfit.riders() {
        let carrier = session.rider_carrier(*rider);
        if session.worn_count(&carrier) > 0 && session.rider(*rider).as_ref() != Some(familiar) {
            return fail(DressExpectation::Rider {
                rider: *rider,
                familiar: familiar.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inventory::Inventory;
    use crate::core::types::{Familiar, RiderSlot};
    use crate::test_support::FakeSession;

    fn item(name: &str) -> Item {
        Item::new(name)
    }

    #[test]
    fn worn_accessory_stays_in_place() {
        let mut session = FakeSession::new()
            .with_gear("lucky ring", Slot::Acc1, 1)
            .with_gear("amulet", Slot::Acc1, 1)
            .wearing(Slot::Acc2, "lucky ring");
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("lucky ring"), None));
        assert!(outfit.equip(&session, item("amulet"), None));

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.worn(Slot::Acc2), Some(item("lucky ring")));
        assert_eq!(session.worn(Slot::Acc1), Some(item("amulet")));
        assert_eq!(session.calls("equip"), vec!["equip acc1 amulet"]);
    }

    #[test]
    fn moved_weapon_is_removed_before_reequipping() {
        let mut session = FakeSession::new()
            .with_weapon("dagger", 1, 1)
            .with_weapon("sword", 1, 1)
            .with_dual_wield()
            .wearing(Slot::Weapon, "dagger");
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("sword"), Some(Slot::Weapon)));
        assert!(outfit.equip(&session, item("dagger"), Some(Slot::OffHand)));

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.worn(Slot::Weapon), Some(item("sword")));
        assert_eq!(session.worn(Slot::OffHand), Some(item("dagger")));
    }

    #[test]
    fn two_handed_weapon_makes_room_for_offhand() {
        let mut session = FakeSession::new()
            .with_weapon("greatsword", 2, 1)
            .with_gear("shield", Slot::OffHand, 1)
            .wearing(Slot::Weapon, "greatsword");
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("shield"), None));

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.worn(Slot::Weapon), None);
        assert_eq!(session.worn(Slot::OffHand), Some(item("shield")));
    }

    #[test]
    fn avoided_items_are_taken_off() {
        let mut session = FakeSession::new()
            .with_gear("cursed hat", Slot::Hat, 1)
            .wearing(Slot::Hat, "cursed hat");
        let mut outfit = Outfit::new();
        outfit.avoid_item(item("cursed hat"));

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.worn(Slot::Hat), None);
    }

    #[test]
    fn maximizer_retries_once_after_refresh() {
        let mut session = FakeSession::new().with_maximize_results([false, true]);
        let mut outfit = Outfit::new();
        outfit.add_modifier("item drop");
        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(
            session.log,
            vec!["maximize item drop", "refresh", "maximize item drop"]
        );

        let mut failing = FakeSession::new().with_maximize_results([false, false, true]);
        let err = dress(&mut failing, "Dig", &outfit).expect_err("fails twice");
        assert!(err.downcast_ref::<MaximizationFailure>().is_some());
        assert_eq!(failing.calls("maximize").len(), 2);
    }

    #[test]
    fn maximizer_sees_used_slots_and_constraints() {
        let mut session = FakeSession::new().with_gear("helmet", Slot::Hat, 1);
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("helmet"), None));
        outfit.add_modifier("meat drop");
        outfit.avoid_item(item("cursed ring"));

        dress(&mut session, "t", &outfit).expect("dress");
        let request = &session.maximize_requests[0];
        assert_eq!(request.used_slots, vec![Slot::Hat]);
        assert_eq!(request.avoid, vec![item("cursed ring")]);
    }

    #[test]
    fn riders_move_between_carriers() {
        let mut session = FakeSession::new()
            .with_gear("Buddy Bjorn", Slot::Back, 1)
            .with_gear("Crown of Thrones", Slot::Hat, 1)
            .with_familiar("Sprite")
            .wearing(Slot::Back, "Buddy Bjorn")
            .wearing(Slot::Hat, "Crown of Thrones");
        session.riders.insert(RiderSlot::Backpack, Familiar::new("Sprite"));
        let mut outfit = Outfit::new();
        outfit
            .set_rider(&session, RiderSlot::Throne, &[Familiar::new("Sprite")])
            .expect("rider");

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.rider(RiderSlot::Throne), Some(Familiar::new("Sprite")));
        assert_eq!(session.rider(RiderSlot::Backpack), None);
    }

    #[test]
    fn riders_wait_for_their_carrier() {
        let mut session = FakeSession::new().with_familiar("Sprite");
        let mut outfit = Outfit::new();
        outfit
            .set_rider(&session, RiderSlot::Backpack, &[Familiar::new("Sprite")])
            .expect("rider");
        dress(&mut session, "t", &outfit).expect("dress");
        assert!(session.calls("rider").is_empty());
    }

    #[test]
    fn failed_equip_names_item_and_slot() {
        let mut session = FakeSession::new().with_gear("helmet", Slot::Hat, 1);
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("helmet"), None));
        // The helmet disappears between planning and commit.
        session.inventory.clear();
        session.home.clear();

        let err = dress(&mut session, "Dig", &outfit).expect_err("no helmet");
        assert!(err.to_string().contains("equip helmet in hat"));
    }

    #[test]
    fn slot_that_did_not_stick_fails_verification() {
        let mut session = FakeSession::new()
            .with_gear("helmet", Slot::Hat, 1)
            .with_jammed_slot(Slot::Hat);
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, item("helmet"), None));

        let err = dress(&mut session, "Dig", &outfit).expect_err("hat stays empty");
        let failure = err
            .downcast_ref::<DressVerificationFailure>()
            .expect("verification failure");
        assert_eq!(
            failure.expected,
            DressExpectation::Slot {
                slot: Slot::Hat,
                item: item("helmet")
            }
        );
        assert_eq!(
            err.to_string(),
            "Task Dig failed to fully dress (expected: hat helmet)"
        );
    }

    #[test]
    fn familiar_that_did_not_switch_fails_verification() {
        let mut session = FakeSession::new()
            .with_familiar("Puck")
            .using_familiar("Goat")
            .with_locked_familiar();
        let mut outfit = Outfit::new();
        assert!(outfit.equip(&session, Familiar::new("Puck"), None));

        let err = dress(&mut session, "Dig", &outfit).expect_err("Goat stays out");
        let failure = err
            .downcast_ref::<DressVerificationFailure>()
            .expect("verification failure");
        assert_eq!(
            failure.expected,
            DressExpectation::Familiar(Familiar::new("Puck"))
        );
        assert!(err.to_string().contains("expected: familiar Puck"));
        assert_eq!(session.active_familiar(), Some(Familiar::new("Goat")));
    }

    #[test]
    fn custom_carrier_enables_rider() {
        let mut session = FakeSession::new()
            .with_gear("pouch", Slot::Back, 1)
            .with_carrier(RiderSlot::Backpack, "pouch")
            .with_familiar("Sprite")
            .wearing(Slot::Back, "pouch");
        let mut outfit = Outfit::new();
        outfit
            .set_rider(&session, RiderSlot::Backpack, &[Familiar::new("Sprite")])
            .expect("rider");

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.rider(RiderSlot::Backpack), Some(Familiar::new("Sprite")));
    }

    #[test]
    fn modes_and_familiar_are_applied() {
        use crate::core::modes::{ModeSetting, Modes};
        use crate::core::outfit_spec::OutfitSpec;

        let mut session = FakeSession::new().with_familiar("Puck");
        let mut outfit = Outfit::new();
        let spec = OutfitSpec::new()
            .with_familiar(Familiar::new("Puck"))
            .with_modes(Modes::new().with("umbrella", ModeSetting::Single("broken".to_string())));
        assert!(outfit.equip(&session, spec, None));

        dress(&mut session, "t", &outfit).expect("dress");
        assert_eq!(session.active_familiar(), Some(Familiar::new("Puck")));
        assert_eq!(session.modes["umbrella"], "broken");
    }
}
