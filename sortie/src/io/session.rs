//! Game session abstraction.
//!
//! The [`Session`] trait is everything the engine does to the outside world.
//! The real client lives outside this crate; tests drive the engine through
//! [`crate::test_support::FakeSession`].

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;

use crate::core::inventory::Inventory;
use crate::core::modes::{ModeSetting, Modes};
use crate::core::types::{Effect, Familiar, Item, Location, RiderSlot, Slot};

/// Callback run against the live session (dress hooks, task callbacks).
pub type SessionHook = Rc<dyn Fn(&mut dyn Session) -> Result<()>>;

/// Constraints handed to the external maximizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaximizeRequest {
    /// Free-text optimization goals.
    pub goals: Vec<String>,
    /// Slots already filled by the plan; the maximizer must not touch them.
    pub used_slots: Vec<Slot>,
    pub avoid: Vec<Item>,
    pub modes: Modes,
    /// Extra preference weight per item.
    pub bonuses: BTreeMap<Item, f64>,
}

impl MaximizeRequest {
    /// Render goals and constraints as a single maximizer expression.
    pub fn expression(&self) -> String {
        let mut parts = self.goals.clone();
        for item in &self.avoid {
            parts.push(format!("-equip {}", item));
        }
        for (item, weight) in &self.bonuses {
            parts.push(format!("{} bonus {}", weight, item));
        }
        parts.join(", ")
    }
}

/// Mutating view of the game session.
pub trait Session: Inventory {
    /// Put `item` in `slot`, or empty the slot when `item` is `None`.
    fn equip(&mut self, slot: Slot, item: Option<&Item>) -> Result<()>;

    fn use_familiar(&mut self, familiar: &Familiar) -> Result<()>;

    /// Seat `familiar` in `rider`, or clear it when `None`.
    fn set_rider(&mut self, rider: RiderSlot, familiar: Option<&Familiar>) -> Result<()>;

    fn apply_mode(&mut self, class: &str, setting: &ModeSetting) -> Result<()>;

    /// Buy up to `quantity` copies at no more than `max_price` each.
    fn buy(&mut self, item: &Item, quantity: u32, max_price: u32) -> Result<()>;

    /// Fold a related item into `item`. Returns false if nothing could be folded.
    fn fold(&mut self, item: &Item) -> Result<bool>;

    /// Generic retrieval (storage, crafting, shops) of `quantity` copies.
    fn retrieve(&mut self, item: &Item, quantity: u32) -> Result<()>;

    fn shrug(&mut self, effect: &Effect) -> Result<()>;

    /// Make `effect` active, casting or using whatever provides it.
    fn ensure_effect(&mut self, effect: &Effect) -> Result<()>;

    fn install_macro(&mut self, text: &str) -> Result<()>;

    fn install_autoattack(&mut self, text: &str) -> Result<()>;

    /// Visit `location` and resolve the resulting combat or choice.
    fn adventure(&mut self, location: &Location) -> Result<()>;

    fn last_encounter(&self) -> Option<String>;

    fn last_location(&self) -> Option<Location>;

    /// Environment tag (e.g. `outdoor`) of a location.
    fn location_environment(&self, location: &Location) -> Option<String>;

    fn turns_spent(&self, location: &Location) -> u32;

    /// Fill the unconstrained slots. Returns false if the maximizer failed.
    fn maximize(&mut self, request: &MaximizeRequest) -> Result<bool>;

    /// Drop cached inventory so the next query sees fresh state.
    fn refresh_inventory(&mut self) -> Result<()>;

    fn get_setting(&self, key: &str) -> Option<String>;

    fn set_setting(&mut self, key: &str, value: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_lists_goals_then_constraints() {
        let request = MaximizeRequest {
            goals: vec!["item drop".to_string(), "-combat".to_string()],
            avoid: vec![Item::new("cursed ring")],
            bonuses: BTreeMap::from([(Item::new("lucky charm"), 25.0)]),
            ..MaximizeRequest::default()
        };
        assert_eq!(
            request.expression(),
            "item drop, -combat, -equip cursed ring, 25 bonus lucky charm"
        );
    }
}
