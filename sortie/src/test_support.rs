//! Test-only helpers: an in-memory game session and task builders.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::core::inventory::Inventory;
use crate::core::modes::ModeSetting;
use crate::core::types::{Effect, Familiar, Item, Location, RiderSlot, Skill, Slot};
use crate::io::session::{MaximizeRequest, Session, SessionHook};
use crate::task::{Predicate, Task, TaskBody, hook, predicate};

/// Deterministic session backed by plain maps.
///
/// Every mutating call except setting writes is appended to `log` so tests
/// can assert on ordering.
#[derive(Debug, Default)]
pub struct FakeSession {
    /// Carried (not worn) copies.
    pub inventory: BTreeMap<Item, u32>,
    pub worn: BTreeMap<Slot, Item>,
    pub home: BTreeMap<Item, Slot>,
    pub hands: BTreeMap<Item, u8>,
    pub single: BTreeSet<Item>,
    pub unwearable: BTreeSet<Item>,
    pub familiars: BTreeSet<Familiar>,
    /// Companion equipment usable only by one familiar.
    pub familiar_gear: BTreeMap<Item, Familiar>,
    pub holders: BTreeMap<Slot, Familiar>,
    pub dual_wield: bool,
    /// Slots whose equip calls are logged but change nothing.
    pub jammed: BTreeSet<Slot>,
    /// Familiar switches are logged but change nothing.
    pub familiar_locked: bool,
    pub skills: BTreeSet<Skill>,
    pub familiar: Option<Familiar>,
    pub riders: BTreeMap<RiderSlot, Familiar>,
    pub carriers: BTreeMap<RiderSlot, Item>,
    pub effects: Vec<Effect>,
    pub songs: BTreeSet<Effect>,
    pub modes: BTreeMap<String, String>,
    pub settings: BTreeMap<String, String>,
    pub shop: BTreeMap<Item, u32>,
    pub folds: BTreeSet<Item>,
    pub storage: BTreeMap<Item, u32>,
    pub macro_text: Option<String>,
    pub autoattack_text: Option<String>,
    /// Encounter names returned by successive adventures.
    pub encounters: VecDeque<String>,
    pub environments: BTreeMap<Location, String>,
    pub turns: BTreeMap<Location, u32>,
    pub last_encounter: Option<String>,
    pub last_location: Option<Location>,
    /// Results for successive maximizer calls; defaults to success.
    pub maximize_results: VecDeque<bool>,
    pub maximize_requests: Vec<MaximizeRequest>,
    pub log: Vec<String>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, name: &str, count: u32) -> Self {
        *self.inventory.entry(Item::new(name)).or_insert(0) += count;
        self
    }

    /// Own `count` copies of an item that lives in `slot`.
    pub fn with_gear(mut self, name: &str, slot: Slot, count: u32) -> Self {
        let slot = if slot.is_accessory() { Slot::Acc1 } else { slot };
        self.home.insert(Item::new(name), slot);
        self.with_item(name, count)
    }

    pub fn with_weapon(mut self, name: &str, hands: u8, count: u32) -> Self {
        self.hands.insert(Item::new(name), hands);
        self.with_gear(name, Slot::Weapon, count)
    }

    pub fn with_single_equip(mut self, name: &str) -> Self {
        self.single.insert(Item::new(name));
        self
    }

    pub fn with_unwearable(mut self, name: &str) -> Self {
        self.unwearable.insert(Item::new(name));
        self
    }

    pub fn with_familiar(mut self, name: &str) -> Self {
        self.familiars.insert(Familiar::new(name));
        self
    }

    pub fn using_familiar(mut self, name: &str) -> Self {
        self.familiar = Some(Familiar::new(name));
        self.with_familiar(name)
    }

    pub fn with_familiar_gear(mut self, item: &str, familiar: &str) -> Self {
        self.familiar_gear
            .insert(Item::new(item), Familiar::new(familiar));
        self
    }

    pub fn with_holder(mut self, slot: Slot, familiar: &str) -> Self {
        self.holders.insert(slot, Familiar::new(familiar));
        self
    }

    pub fn with_dual_wield(mut self) -> Self {
        self.dual_wield = true;
        self
    }

    pub fn with_jammed_slot(mut self, slot: Slot) -> Self {
        self.jammed.insert(slot);
        self
    }

    pub fn with_locked_familiar(mut self) -> Self {
        self.familiar_locked = true;
        self
    }

    pub fn with_skill(mut self, name: &str) -> Self {
        self.skills.insert(Skill::new(name));
        self
    }

    /// Wear an item that is already registered with a home slot.
    pub fn wearing(mut self, slot: Slot, name: &str) -> Self {
        let item = Item::new(name);
        if let Some(count) = self.inventory.get_mut(&item) {
            *count = count.saturating_sub(1);
        }
        self.worn.insert(slot, item);
        self
    }

    pub fn with_carrier(mut self, rider: RiderSlot, item: &str) -> Self {
        self.carriers.insert(rider, Item::new(item));
        self
    }

    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_shop(mut self, name: &str, price: u32) -> Self {
        self.shop.insert(Item::new(name), price);
        self
    }

    pub fn with_fold(mut self, name: &str) -> Self {
        self.folds.insert(Item::new(name));
        self
    }

    pub fn with_storage(mut self, name: &str, count: u32) -> Self {
        self.storage.insert(Item::new(name), count);
        self
    }

    pub fn with_song(mut self, name: &str) -> Self {
        self.songs.insert(Effect::new(name));
        self
    }

    pub fn with_active_effect(mut self, name: &str) -> Self {
        self.effects.push(Effect::new(name));
        self
    }

    pub fn with_environment(mut self, location: &str, environment: &str) -> Self {
        self.environments
            .insert(Location::new(location), environment.to_string());
        self
    }

    pub fn with_encounters<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.encounters.extend(names.into_iter().map(str::to_string));
        self
    }

    pub fn with_maximize_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.maximize_results.extend(results);
        self
    }

    /// Log entries that start with `prefix`.
    pub fn calls(&self, prefix: &str) -> Vec<&str> {
        self.log
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

impl Inventory for FakeSession {
    fn owned(&self, item: &Item) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0) + self.worn_count(item)
    }

    fn worn_count(&self, item: &Item) -> u32 {
        self.worn.values().filter(|worn| *worn == item).count() as u32
    }

    fn home_slot(&self, item: &Item) -> Option<Slot> {
        self.home.get(item).copied()
    }

    fn weapon_hands(&self, item: &Item) -> u8 {
        self.hands.get(item).copied().unwrap_or(0)
    }

    fn single_equip(&self, item: &Item) -> bool {
        self.single.contains(item)
    }

    fn can_wear(&self, item: &Item) -> bool {
        !self.unwearable.contains(item)
    }

    fn has_familiar(&self, familiar: &Familiar) -> bool {
        self.familiars.contains(familiar)
    }

    fn familiar_can_wear(&self, familiar: &Familiar, item: &Item) -> bool {
        match self.home_slot(item) {
            Some(Slot::Familiar) => self
                .familiar_gear
                .get(item)
                .is_none_or(|owner| owner == familiar),
            Some(slot) => self.holders.get(&slot) == Some(familiar),
            None => false,
        }
    }

    fn has_skill(&self, skill: &Skill) -> bool {
        self.skills.contains(skill)
    }

    fn can_dual_wield(&self) -> bool {
        self.dual_wield
    }

    fn holding_familiar(&self, slot: Slot) -> Option<Familiar> {
        self.holders.get(&slot).cloned()
    }

    fn rider_carrier(&self, rider: RiderSlot) -> Item {
        self.carriers
            .get(&rider)
            .cloned()
            .unwrap_or_else(|| match rider {
                RiderSlot::Backpack => Item::new("Buddy Bjorn"),
                RiderSlot::Throne => Item::new("Crown of Thrones"),
            })
    }

    fn worn(&self, slot: Slot) -> Option<Item> {
        self.worn.get(&slot).cloned()
    }

    fn active_familiar(&self) -> Option<Familiar> {
        self.familiar.clone()
    }

    fn rider(&self, rider: RiderSlot) -> Option<Familiar> {
        self.riders.get(&rider).cloned()
    }

    fn active_effects(&self) -> Vec<Effect> {
        self.effects.clone()
    }

    fn is_song(&self, effect: &Effect) -> bool {
        self.songs.contains(effect)
    }
}

impl Session for FakeSession {
    fn equip(&mut self, slot: Slot, item: Option<&Item>) -> Result<()> {
        if self.jammed.contains(&slot) {
            self.log.push(format!("equip {} jammed", slot));
            return Ok(());
        }
        if let Some(item) = item {
            let carried = self.inventory.get(item).copied().unwrap_or(0);
            if carried == 0 {
                bail!("no spare {} to equip in {}", item, slot);
            }
            if slot == Slot::OffHand {
                let blocked = self
                    .worn
                    .get(&Slot::Weapon)
                    .is_some_and(|weapon| self.weapon_hands(weapon) >= 2);
                if blocked {
                    bail!("two-handed weapon blocks {}", item);
                }
            }
        }
        if let Some(old) = self.worn.remove(&slot) {
            *self.inventory.entry(old).or_insert(0) += 1;
        }
        match item {
            Some(item) => {
                if let Some(count) = self.inventory.get_mut(item) {
                    *count -= 1;
                }
                self.worn.insert(slot, item.clone());
                self.log.push(format!("equip {} {}", slot, item));
            }
            None => self.log.push(format!("equip {} none", slot)),
        }
        Ok(())
    }

    fn use_familiar(&mut self, familiar: &Familiar) -> Result<()> {
        if self.familiar_locked {
            self.log.push(format!("familiar {} locked", familiar));
            return Ok(());
        }
        if familiar.is_none() {
            self.familiar = None;
        } else {
            if !self.familiars.contains(familiar) {
                bail!("do not have familiar {}", familiar);
            }
            self.riders.retain(|_, rider| rider != familiar);
            self.familiar = Some(familiar.clone());
        }
        self.log.push(format!("familiar {}", familiar));
        Ok(())
    }

    fn set_rider(&mut self, rider: RiderSlot, familiar: Option<&Familiar>) -> Result<()> {
        match familiar {
            Some(familiar) => {
                if self.riders.values().any(|r| r == familiar) {
                    bail!("{} is already riding", familiar);
                }
                self.riders.insert(rider, familiar.clone());
                self.log.push(format!("rider {} {}", rider, familiar));
            }
            None => {
                self.riders.remove(&rider);
                self.log.push(format!("rider {} none", rider));
            }
        }
        Ok(())
    }

    fn apply_mode(&mut self, class: &str, setting: &ModeSetting) -> Result<()> {
        self.modes.insert(class.to_string(), setting.render());
        self.log.push(format!("mode {} {}", class, setting.render()));
        Ok(())
    }

    fn buy(&mut self, item: &Item, quantity: u32, max_price: u32) -> Result<()> {
        if self.shop.get(item).is_some_and(|&price| price <= max_price) {
            *self.inventory.entry(item.clone()).or_insert(0) += quantity;
        }
        self.log
            .push(format!("buy {} x{} @{}", item, quantity, max_price));
        Ok(())
    }

    fn fold(&mut self, item: &Item) -> Result<bool> {
        if !self.folds.contains(item) {
            return Ok(false);
        }
        *self.inventory.entry(item.clone()).or_insert(0) += 1;
        self.log.push(format!("fold {}", item));
        Ok(true)
    }

    fn retrieve(&mut self, item: &Item, quantity: u32) -> Result<()> {
        let stored = self.storage.entry(item.clone()).or_insert(0);
        let taken = quantity.min(*stored);
        *stored -= taken;
        *self.inventory.entry(item.clone()).or_insert(0) += taken;
        self.log.push(format!("retrieve {} x{}", item, quantity));
        Ok(())
    }

    fn shrug(&mut self, effect: &Effect) -> Result<()> {
        self.effects.retain(|e| e != effect);
        self.log.push(format!("shrug {}", effect));
        Ok(())
    }

    fn ensure_effect(&mut self, effect: &Effect) -> Result<()> {
        if !self.effects.contains(effect) {
            self.effects.push(effect.clone());
        }
        self.log.push(format!("ensure {}", effect));
        Ok(())
    }

    fn install_macro(&mut self, text: &str) -> Result<()> {
        self.macro_text = Some(text.to_string());
        self.log.push("macro".to_string());
        Ok(())
    }

    fn install_autoattack(&mut self, text: &str) -> Result<()> {
        self.autoattack_text = Some(text.to_string());
        self.log.push("autoattack".to_string());
        Ok(())
    }

    fn adventure(&mut self, location: &Location) -> Result<()> {
        *self.turns.entry(location.clone()).or_insert(0) += 1;
        let encounter = self
            .encounters
            .pop_front()
            .unwrap_or_else(|| format!("{} fight", location));
        self.last_encounter = Some(encounter);
        self.last_location = Some(location.clone());
        self.log.push(format!("adventure {}", location));
        Ok(())
    }

    fn last_encounter(&self) -> Option<String> {
        self.last_encounter.clone()
    }

    fn last_location(&self) -> Option<Location> {
        self.last_location.clone()
    }

    fn location_environment(&self, location: &Location) -> Option<String> {
        self.environments.get(location).cloned()
    }

    fn turns_spent(&self, location: &Location) -> u32 {
        self.turns.get(location).copied().unwrap_or(0)
    }

    fn maximize(&mut self, request: &MaximizeRequest) -> Result<bool> {
        self.maximize_requests.push(request.clone());
        self.log.push(format!("maximize {}", request.expression()));
        Ok(self.maximize_results.pop_front().unwrap_or(true))
    }

    fn refresh_inventory(&mut self) -> Result<()> {
        self.log.push("refresh".to_string());
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned()
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// True once setting `key` is `"true"`.
pub fn flag_set(key: &str) -> Predicate {
    let key = key.to_string();
    predicate(move |s| s.get_setting(&key).as_deref() == Some("true"))
}

/// Hook that sets setting `key` to `"true"`.
pub fn set_flag(key: &str) -> SessionHook {
    let key = key.to_string();
    hook(move |s| s.set_setting(&key, "true"))
}

/// Task whose body sets `done.<name>` and which completes once that is set.
pub fn flag_task(name: &str) -> Task {
    let key = format!("done.{}", name);
    Task::new(name, TaskBody::Callback(set_flag(&key)), flag_set(&key))
}

/// Task that never completes and whose body does nothing.
pub fn stubborn_task(name: &str) -> Task {
    Task::new(
        name,
        TaskBody::Callback(hook(|_| Ok(()))),
        predicate(|_| false),
    )
}

/// Write a manifest into a fresh temp dir. Keep the `TempDir` alive.
pub fn manifest_file(contents: &str) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("tasks.toml");
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}
