//! Read-only view of the character used by pure planning logic.
//!
//! The outfit solver and the selection rules only ever ask questions; they
//! never mutate the session. Keeping those questions behind this trait lets
//! the solver stay deterministic and testable against an in-memory fake.

use crate::core::types::{Effect, Familiar, Item, RiderSlot, Skill, Slot};

pub trait Inventory {
    /// Copies owned, counting both carried and currently worn copies.
    fn owned(&self, item: &Item) -> u32;

    /// Copies currently worn in any slot.
    fn worn_count(&self, item: &Item) -> u32;

    /// Slot the item naturally occupies. Accessories report [`Slot::Acc1`].
    fn home_slot(&self, item: &Item) -> Option<Slot>;

    /// Number of hands a weapon needs (0 for non-weapons).
    fn weapon_hands(&self, item: &Item) -> u8;

    /// True if at most one copy may be worn at a time.
    fn single_equip(&self, item: &Item) -> bool;

    /// True if the character meets the requirements to wear the item.
    fn can_wear(&self, item: &Item) -> bool;

    fn has_familiar(&self, familiar: &Familiar) -> bool;

    /// True if `familiar` can wear `item` as companion equipment.
    fn familiar_can_wear(&self, familiar: &Familiar, item: &Item) -> bool;

    fn has_skill(&self, skill: &Skill) -> bool;

    /// True if a one-handed weapon may be held in the off-hand.
    fn can_dual_wield(&self) -> bool;

    /// Companion that can carry an item of this slot in place of the character.
    fn holding_familiar(&self, slot: Slot) -> Option<Familiar>;

    /// Item that must be worn for a companion to ride in `rider`.
    fn rider_carrier(&self, rider: RiderSlot) -> Item;

    /// Item currently in `slot`, if any.
    fn worn(&self, slot: Slot) -> Option<Item>;

    fn active_familiar(&self) -> Option<Familiar>;

    /// Companion currently riding in `rider`, if any.
    fn rider(&self, rider: RiderSlot) -> Option<Familiar>;

    fn active_effects(&self) -> Vec<Effect>;

    /// True if the effect belongs to the capped song category.
    fn is_song(&self, effect: &Effect) -> bool;
}
