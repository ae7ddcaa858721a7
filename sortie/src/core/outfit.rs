//! Outfit equip solver.
//!
//! An [`Outfit`] is a working assignment of items to slots plus companion,
//! riders, modes and maximizer hints. Requests are merged one at a time and
//! each is checked against what the character owns and what is already
//! planned. Nothing here touches the session; committing the plan is done by
//! [`crate::dress`].
//!
//! Merging a whole [`OutfitSpec`] is not transactional: sub-fields that fit
//! stay placed even when a later sub-field is rejected. Callers that need an
//! all-or-nothing answer use [`Outfit::can_equip`], which works on a clone.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::core::inventory::Inventory;
use crate::core::modes::{ModeConflict, Modes};
use crate::core::outfit_spec::{Equippable, ItemChoice, OutfitSpec};
use crate::core::types::{Familiar, Item, RiderSlot, Slot};
use crate::io::session::SessionHook;

/// Why a piece of an outfit request could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("need {needed} {item} but only own {owned}")]
    NotOwned { item: Item, needed: u32, owned: u32 },
    #[error("{0} is on the avoid list")]
    Avoided(Item),
    #[error("{0} can only be equipped once")]
    SingleEquip(Item),
    #[error("no free slot for {item}{}", .slot.map(|s| format!(" in {}", s)).unwrap_or_default())]
    NoPlacement { item: Item, slot: Option<Slot> },
    #[error("{slot} already holds {current}")]
    SlotTaken { slot: Slot, current: Item },
    #[error("familiar {active} is already planned (wanted {requested})")]
    FamiliarConflict { requested: Familiar, active: Familiar },
    #[error("do not have familiar {0}")]
    FamiliarNotOwned(Familiar),
    #[error("{familiar} cannot wear {item}")]
    FamiliarCannotWear { familiar: Familiar, item: Item },
    #[error("{0} is already riding")]
    FamiliarRiding(Familiar),
    #[error("{rider} already carries {current}")]
    RiderTaken { rider: RiderSlot, current: Familiar },
    #[error("no available familiar for {0}")]
    NoRiderCandidate(RiderSlot),
    #[error("mode {} is set to {} (wanted {})", .0.class, .0.existing.render(), .0.requested.render())]
    Mode(ModeConflict),
    #[error("none of the choices fit {slot}: {}", join(.reasons))]
    NoChoiceFits { slot: Slot, reasons: Vec<Rejection> },
    #[error("{}", join(.0))]
    Several(Vec<Rejection>),
}

fn join(reasons: &[Rejection]) -> String {
    reasons
        .iter()
        .map(Rejection::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ModeConflict> for Rejection {
    fn from(conflict: ModeConflict) -> Self {
        Rejection::Mode(conflict)
    }
}

/// Working equipment plan.
#[derive(Clone, Default)]
pub struct Outfit {
    equips: BTreeMap<Slot, Item>,
    familiar: Option<Familiar>,
    riders: BTreeMap<RiderSlot, Familiar>,
    modes: Modes,
    avoid: Vec<Item>,
    modifier: Vec<String>,
    bonuses: BTreeMap<Item, f64>,
    before_dress: Vec<SessionHook>,
    after_dress: Vec<SessionHook>,
}

impl Outfit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh outfit from a spec, failing if any part is rejected.
    pub fn from_spec<I: Inventory + ?Sized>(
        inv: &I,
        spec: OutfitSpec,
    ) -> Result<Outfit, Rejection> {
        let mut outfit = Outfit::new();
        outfit.try_equip(inv, spec, None)?;
        Ok(outfit)
    }

    pub fn equips(&self) -> &BTreeMap<Slot, Item> {
        &self.equips
    }

    pub fn get(&self, slot: Slot) -> Option<&Item> {
        self.equips.get(&slot)
    }

    pub fn familiar(&self) -> Option<&Familiar> {
        self.familiar.as_ref()
    }

    pub fn riders(&self) -> &BTreeMap<RiderSlot, Familiar> {
        &self.riders
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn avoid(&self) -> &[Item] {
        &self.avoid
    }

    pub fn modifier(&self) -> &[String] {
        &self.modifier
    }

    pub fn bonuses(&self) -> &BTreeMap<Item, f64> {
        &self.bonuses
    }

    pub fn before_dress_hooks(&self) -> &[SessionHook] {
        &self.before_dress
    }

    pub fn after_dress_hooks(&self) -> &[SessionHook] {
        &self.after_dress
    }

    /// Copies of `item` planned across all slots.
    pub fn count(&self, item: &Item) -> u32 {
        self.equips.values().filter(|planned| *planned == item).count() as u32
    }

    pub fn add_modifier(&mut self, goal: impl Into<String>) {
        self.modifier.push(goal.into());
    }

    pub fn avoid_item(&mut self, item: Item) {
        if !self.avoid.contains(&item) {
            self.avoid.push(item);
        }
    }

    pub fn set_bonus(&mut self, item: Item, weight: f64) {
        self.bonuses.insert(item, weight);
    }

    pub fn add_bonus(&mut self, item: Item, weight: f64) {
        *self.bonuses.entry(item).or_insert(0.0) += weight;
    }

    /// Merge weights, combining with `combine(existing, incoming)` on overlap.
    pub fn merge_bonuses(
        &mut self,
        bonuses: impl IntoIterator<Item = (Item, f64)>,
        combine: impl Fn(f64, f64) -> f64,
    ) {
        for (item, weight) in bonuses {
            let merged = match self.bonuses.get(&item) {
                Some(&existing) => combine(existing, weight),
                None => weight,
            };
            self.bonuses.insert(item, merged);
        }
    }

    pub fn before_dress(&mut self, hook: SessionHook) {
        self.before_dress.push(hook);
    }

    pub fn after_dress(&mut self, hook: SessionHook) {
        self.after_dress.push(hook);
    }

    /// Merge `thing` into the plan. Returns false if anything was rejected.
    pub fn equip<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        thing: impl Into<Equippable>,
        slot: Option<Slot>,
    ) -> bool {
        self.try_equip(inv, thing, slot).is_ok()
    }

    /// True if `thing` could be merged. The plan is left untouched.
    pub fn can_equip<I: Inventory + ?Sized>(
        &self,
        inv: &I,
        thing: impl Into<Equippable>,
        slot: Option<Slot>,
    ) -> bool {
        self.clone().equip(inv, thing, slot)
    }

    /// Merge `thing` into the plan, reporting why it was rejected.
    pub fn try_equip<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        thing: impl Into<Equippable>,
        slot: Option<Slot>,
    ) -> Result<(), Rejection> {
        match thing.into() {
            Equippable::Item(item) => self.equip_item(inv, item, slot),
            Equippable::Familiar(familiar) => self.equip_familiar(inv, familiar),
            Equippable::List(things) => self.equip_list(inv, things, slot),
            Equippable::Spec(spec) => self.equip_spec(inv, *spec),
            Equippable::Outfit(outfit) => self.equip_spec(inv, outfit.spec()),
        }
    }

    fn equip_list<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        things: Vec<Equippable>,
        slot: Option<Slot>,
    ) -> Result<(), Rejection> {
        match slot {
            None => {
                for thing in things {
                    self.try_equip(inv, thing, None)?;
                }
                Ok(())
            }
            Some(slot) => {
                let mut reasons = Vec::new();
                for thing in things {
                    match self.try_equip(inv, thing, Some(slot)) {
                        Ok(()) => return Ok(()),
                        Err(reason) => reasons.push(reason),
                    }
                }
                Err(Rejection::NoChoiceFits { slot, reasons })
            }
        }
    }

    fn equip_item<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        item: Item,
        slot: Option<Slot>,
    ) -> Result<(), Rejection> {
        let placed = match slot {
            Some(slot) => self.equips.get(&slot) == Some(&item),
            None => self.count(&item) > 0,
        };
        if placed {
            return Ok(());
        }

        if item.is_none() {
            return self.reserve_empty(slot);
        }

        self.check_available(inv, &item)?;

        if self.place_direct(inv, &item, slot)
            || self.place_accessory(inv, &item, slot)
            || self.place_dual_wield(inv, &item, slot)
            || self.place_with_familiar(inv, &item, slot)
        {
            Ok(())
        } else {
            Err(Rejection::NoPlacement { item, slot })
        }
    }

    fn reserve_empty(&mut self, slot: Option<Slot>) -> Result<(), Rejection> {
        let Some(slot) = slot else {
            return Ok(());
        };
        match self.equips.get(&slot) {
            Some(current) => Err(Rejection::SlotTaken {
                slot,
                current: current.clone(),
            }),
            None => {
                self.equips.insert(slot, Item::none());
                Ok(())
            }
        }
    }

    fn check_available<I: Inventory + ?Sized>(&self, inv: &I, item: &Item) -> Result<(), Rejection> {
        if self.avoid.contains(item) {
            return Err(Rejection::Avoided(item.clone()));
        }
        let planned = self.count(item);
        let owned = inv.owned(item);
        if owned < planned + 1 {
            return Err(Rejection::NotOwned {
                item: item.clone(),
                needed: planned + 1,
                owned,
            });
        }
        if planned > 0 && inv.single_equip(item) {
            return Err(Rejection::SingleEquip(item.clone()));
        }
        Ok(())
    }

    /// The planned weapon blocks the off-hand unless it is one-handed.
    fn weapon_allows_offhand<I: Inventory + ?Sized>(&self, inv: &I) -> bool {
        match self.equips.get(&Slot::Weapon) {
            Some(weapon) if !weapon.is_none() => inv.weapon_hands(weapon) == 1,
            _ => true,
        }
    }

    fn offhand_planned(&self) -> bool {
        self.equips
            .get(&Slot::OffHand)
            .is_some_and(|item| !item.is_none())
    }

    fn place_direct<I: Inventory + ?Sized>(&mut self, inv: &I, item: &Item, slot: Option<Slot>) -> bool {
        let Some(home) = inv.home_slot(item) else {
            return false;
        };
        if home.is_accessory() || slot.is_some_and(|s| s != home) {
            return false;
        }
        if self.equips.contains_key(&home) {
            return false;
        }
        match home {
            Slot::OffHand if !self.weapon_allows_offhand(inv) => return false,
            Slot::Weapon if inv.weapon_hands(item) >= 2 && self.offhand_planned() => return false,
            Slot::Familiar => {
                let blocked = self
                    .familiar
                    .as_ref()
                    .is_some_and(|f| !f.is_none() && !inv.familiar_can_wear(f, item));
                if blocked {
                    return false;
                }
            }
            _ => {
                if !inv.can_wear(item) {
                    return false;
                }
            }
        }
        self.equips.insert(home, item.clone());
        true
    }

    fn place_accessory<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        item: &Item,
        slot: Option<Slot>,
    ) -> bool {
        if !inv.home_slot(item).is_some_and(Slot::is_accessory) {
            return false;
        }
        if slot.is_some_and(|s| !s.is_accessory()) || !inv.can_wear(item) {
            return false;
        }
        let target = match slot {
            Some(slot) => (!self.equips.contains_key(&slot)).then_some(slot),
            None => Slot::ACCESSORIES
                .into_iter()
                .find(|s| !self.equips.contains_key(s)),
        };
        match target {
            Some(target) => {
                self.equips.insert(target, item.clone());
                true
            }
            None => false,
        }
    }

    fn place_dual_wield<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        item: &Item,
        slot: Option<Slot>,
    ) -> bool {
        if slot.is_some_and(|s| s != Slot::OffHand) {
            return false;
        }
        if inv.home_slot(item) != Some(Slot::Weapon) || inv.weapon_hands(item) != 1 {
            return false;
        }
        if self.equips.contains_key(&Slot::OffHand) || !self.weapon_allows_offhand(inv) {
            return false;
        }
        if !inv.can_dual_wield() || !inv.can_wear(item) {
            return false;
        }
        self.equips.insert(Slot::OffHand, item.clone());
        true
    }

    /// Hand the item to a companion that can hold it instead.
    fn place_with_familiar<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        item: &Item,
        slot: Option<Slot>,
    ) -> bool {
        if slot.is_some_and(|s| s != Slot::Familiar) {
            return false;
        }
        if self.equips.contains_key(&Slot::Familiar) || inv.single_equip(item) {
            return false;
        }
        let Some(holder) = inv.home_slot(item).and_then(|home| inv.holding_familiar(home)) else {
            return false;
        };
        if self.equip_familiar(inv, holder).is_err() {
            return false;
        }
        self.equips.insert(Slot::Familiar, item.clone());
        true
    }

    fn equip_familiar<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        familiar: Familiar,
    ) -> Result<(), Rejection> {
        if self.familiar.as_ref() == Some(&familiar) {
            return Ok(());
        }
        if let Some(active) = &self.familiar {
            return Err(Rejection::FamiliarConflict {
                requested: familiar,
                active: active.clone(),
            });
        }
        if !familiar.is_none() && !inv.has_familiar(&familiar) {
            return Err(Rejection::FamiliarNotOwned(familiar));
        }
        if self.riders.values().any(|rider| *rider == familiar) {
            return Err(Rejection::FamiliarRiding(familiar));
        }
        if let Some(item) = self.equips.get(&Slot::Familiar) {
            if !item.is_none() && !familiar.is_none() && !inv.familiar_can_wear(&familiar, item) {
                return Err(Rejection::FamiliarCannotWear {
                    familiar,
                    item: item.clone(),
                });
            }
        }
        self.familiar = Some(familiar);
        Ok(())
    }

    /// Put the first usable candidate into `rider`.
    pub fn set_rider<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        rider: RiderSlot,
        candidates: &[Familiar],
    ) -> Result<(), Rejection> {
        if let Some(current) = self.riders.get(&rider) {
            return if candidates.contains(current) {
                Ok(())
            } else {
                Err(Rejection::RiderTaken {
                    rider,
                    current: current.clone(),
                })
            };
        }
        let other = self.riders.get(&rider.other());
        let chosen = candidates.iter().find(|candidate| {
            inv.has_familiar(candidate)
                && self.familiar.as_ref() != Some(*candidate)
                && other != Some(*candidate)
        });
        match chosen {
            Some(familiar) => {
                self.riders.insert(rider, familiar.clone());
                Ok(())
            }
            None => Err(Rejection::NoRiderCandidate(rider)),
        }
    }

    fn equip_spec<I: Inventory + ?Sized>(
        &mut self,
        inv: &I,
        spec: OutfitSpec,
    ) -> Result<(), Rejection> {
        let mut failures = Vec::new();
        let mut record = |result: Result<(), Rejection>| {
            if let Err(reason) = result {
                failures.push(reason);
            }
        };

        for (slot, choice) in spec.slot_fields() {
            if let Some(choice) = choice {
                record(self.try_equip(inv, choice.clone(), Some(slot)));
            }
        }
        for choice in &spec.equip {
            record(self.try_equip(inv, choice.clone(), None));
        }
        if let Some(familiar) = &spec.familiar {
            record(self.equip_familiar(inv, familiar.clone()));
        }
        for item in spec.avoid {
            self.avoid_item(item);
        }
        self.modifier.extend(spec.modifier);
        record(self.modes.merge(&spec.modes).map_err(Rejection::from));
        for (rider, candidates) in &spec.riders {
            record(self.set_rider(inv, *rider, candidates));
        }
        self.merge_bonuses(spec.bonuses, |a, b| a + b);
        self.before_dress.extend(spec.before_dress);
        self.after_dress.extend(spec.after_dress);

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Rejection::Several(failures)),
        }
    }

    /// Declarative form of the current plan.
    pub fn spec(&self) -> OutfitSpec {
        let mut spec = OutfitSpec::new();
        for (slot, item) in &self.equips {
            *spec.slot_mut(*slot) = Some(ItemChoice::One(item.clone()));
        }
        spec.familiar = self.familiar.clone();
        spec.avoid = self.avoid.clone();
        spec.modifier = self.modifier.clone();
        spec.modes = self.modes.clone();
        spec.riders = self
            .riders
            .iter()
            .map(|(rider, familiar)| (*rider, vec![familiar.clone()]))
            .collect();
        spec.bonuses = self.bonuses.clone();
        spec.before_dress = self.before_dress.clone();
        spec.after_dress = self.after_dress.clone();
        spec
    }
}

impl fmt::Debug for Outfit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outfit")
            .field("equips", &self.equips)
            .field("familiar", &self.familiar)
            .field("riders", &self.riders)
            .field("modes", &self.modes)
            .field("avoid", &self.avoid)
            .field("modifier", &self.modifier)
            .field("bonuses", &self.bonuses)
            .field("before_dress", &self.before_dress.len())
            .field("after_dress", &self.after_dress.len())
            .finish()
    }
}
