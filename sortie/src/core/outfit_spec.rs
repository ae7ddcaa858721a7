//! Declarative outfit requests authored on tasks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::modes::Modes;
use crate::core::outfit::Outfit;
use crate::core::types::{Familiar, Item, RiderSlot, Slot};
use crate::io::session::SessionHook;

/// A single item, or a list of alternatives / requirements.
///
/// In a slot field a list is an ordered preference (first that fits wins).
/// In `equip` a list means every entry must be placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemChoice {
    One(Item),
    Many(Vec<Item>),
}

impl From<Item> for ItemChoice {
    fn from(item: Item) -> Self {
        ItemChoice::One(item)
    }
}

impl From<Vec<Item>> for ItemChoice {
    fn from(items: Vec<Item>) -> Self {
        ItemChoice::Many(items)
    }
}

impl From<ItemChoice> for Equippable {
    fn from(choice: ItemChoice) -> Self {
        match choice {
            ItemChoice::One(item) => Equippable::Item(item),
            ItemChoice::Many(items) => {
                Equippable::List(items.into_iter().map(Equippable::Item).collect())
            }
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutfitSpec {
    pub hat: Option<ItemChoice>,
    pub back: Option<ItemChoice>,
    pub weapon: Option<ItemChoice>,
    pub offhand: Option<ItemChoice>,
    pub shirt: Option<ItemChoice>,
    pub pants: Option<ItemChoice>,
    pub acc1: Option<ItemChoice>,
    pub acc2: Option<ItemChoice>,
    pub acc3: Option<ItemChoice>,
    pub famequip: Option<ItemChoice>,
    /// Items placed in whatever slot fits.
    pub equip: Vec<ItemChoice>,
    pub familiar: Option<Familiar>,
    pub avoid: Vec<Item>,
    /// Free-text goals for the maximizer.
    pub modifier: Vec<String>,
    pub modes: Modes,
    /// Ranked candidates per rider slot.
    pub riders: BTreeMap<RiderSlot, Vec<Familiar>>,
    pub bonuses: BTreeMap<Item, f64>,
    #[serde(skip)]
    pub before_dress: Vec<SessionHook>,
    #[serde(skip)]
    pub after_dress: Vec<SessionHook>,
}

impl OutfitSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot fields in the order they are merged.
    pub fn slot_fields(&self) -> [(Slot, Option<&ItemChoice>); 10] {
        [
            (Slot::Hat, self.hat.as_ref()),
            (Slot::Back, self.back.as_ref()),
            (Slot::Weapon, self.weapon.as_ref()),
            (Slot::OffHand, self.offhand.as_ref()),
            (Slot::Shirt, self.shirt.as_ref()),
            (Slot::Pants, self.pants.as_ref()),
            (Slot::Acc1, self.acc1.as_ref()),
            (Slot::Acc2, self.acc2.as_ref()),
            (Slot::Acc3, self.acc3.as_ref()),
            (Slot::Familiar, self.famequip.as_ref()),
        ]
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Option<ItemChoice> {
        match slot {
            Slot::Hat => &mut self.hat,
            Slot::Back => &mut self.back,
            Slot::Weapon => &mut self.weapon,
            Slot::OffHand => &mut self.offhand,
            Slot::Shirt => &mut self.shirt,
            Slot::Pants => &mut self.pants,
            Slot::Acc1 => &mut self.acc1,
            Slot::Acc2 => &mut self.acc2,
            Slot::Acc3 => &mut self.acc3,
            Slot::Familiar => &mut self.famequip,
        }
    }

    pub fn with_slot(mut self, slot: Slot, choice: impl Into<ItemChoice>) -> Self {
        *self.slot_mut(slot) = Some(choice.into());
        self
    }

    pub fn with_equip(mut self, choice: impl Into<ItemChoice>) -> Self {
        self.equip.push(choice.into());
        self
    }

    pub fn with_familiar(mut self, familiar: Familiar) -> Self {
        self.familiar = Some(familiar);
        self
    }

    pub fn with_modifier(mut self, goal: impl Into<String>) -> Self {
        self.modifier.push(goal.into());
        self
    }

    pub fn with_avoid(mut self, item: Item) -> Self {
        self.avoid.push(item);
        self
    }

    pub fn with_modes(mut self, modes: Modes) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_riders(mut self, rider: RiderSlot, candidates: Vec<Familiar>) -> Self {
        self.riders.insert(rider, candidates);
        self
    }

    pub fn with_bonus(mut self, item: Item, weight: f64) -> Self {
        self.bonuses.insert(item, weight);
        self
    }
}

impl fmt::Debug for OutfitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("OutfitSpec");
        for (slot, choice) in self.slot_fields() {
            if let Some(choice) = choice {
                out.field(slot.label(), choice);
            }
        }
        out.field("equip", &self.equip)
            .field("familiar", &self.familiar)
            .field("avoid", &self.avoid)
            .field("modifier", &self.modifier)
            .field("modes", &self.modes)
            .field("riders", &self.riders)
            .field("bonuses", &self.bonuses)
            .field("before_dress", &self.before_dress.len())
            .field("after_dress", &self.after_dress.len())
            .finish()
    }
}

/// Anything the solver can place into an outfit.
#[derive(Clone)]
pub enum Equippable {
    Item(Item),
    Familiar(Familiar),
    List(Vec<Equippable>),
    Spec(Box<OutfitSpec>),
    Outfit(Box<Outfit>),
}

impl From<Item> for Equippable {
    fn from(item: Item) -> Self {
        Equippable::Item(item)
    }
}

impl From<Familiar> for Equippable {
    fn from(familiar: Familiar) -> Self {
        Equippable::Familiar(familiar)
    }
}

impl From<OutfitSpec> for Equippable {
    fn from(spec: OutfitSpec) -> Self {
        Equippable::Spec(Box::new(spec))
    }
}

impl From<Outfit> for Equippable {
    fn from(outfit: Outfit) -> Self {
        Equippable::Outfit(Box::new(outfit))
    }
}

impl From<Vec<Item>> for Equippable {
    fn from(items: Vec<Item>) -> Self {
        Equippable::List(items.into_iter().map(Equippable::Item).collect())
    }
}

impl From<Vec<Equippable>> for Equippable {
    fn from(things: Vec<Equippable>) -> Self {
        Equippable::List(things)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_deserializes_items_and_alternatives() {
        let raw = r#"{
            "hat": "helmet",
            "weapon": ["sword", "club"],
            "equip": ["ring", ["amulet", "charm"]],
            "familiar": "Puck",
            "modifier": ["item drop"],
            "modes": {"umbrella": "broken", "cape": ["vampire", null]},
            "riders": {"backpack": ["Sprite", "Goat"]},
            "bonuses": {"lucky charm": 25.0}
        }"#;
        let spec: OutfitSpec = serde_json::from_str(raw).expect("parse");
        assert_eq!(spec.hat, Some(ItemChoice::One(Item::new("helmet"))));
        assert_eq!(
            spec.weapon,
            Some(ItemChoice::Many(vec![Item::new("sword"), Item::new("club")]))
        );
        assert_eq!(spec.equip.len(), 2);
        assert_eq!(spec.familiar, Some(Familiar::new("Puck")));
        assert_eq!(spec.riders[&RiderSlot::Backpack].len(), 2);
        assert_eq!(spec.bonuses[&Item::new("lucky charm")], 25.0);
        assert!(spec.modes.get("cape").is_some());
    }

    #[test]
    fn slot_builder_fills_matching_field() {
        let spec = OutfitSpec::new().with_slot(Slot::OffHand, Item::new("shield"));
        assert_eq!(spec.offhand, Some(ItemChoice::One(Item::new("shield"))));
        assert!(spec.hat.is_none());
    }
}
