//! Identifiers for game entities and the fixed equipment layout.
//!
//! Game content (what an item does, which monster lives where) is owned by
//! the session. The engine only needs stable names it can compare, hash, and
//! render into macros, so every entity is a thin string newtype.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! named {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn name(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }
    };
}

named!(
    /// An equippable or consumable item.
    Item
);
named!(
    /// A companion creature (familiar).
    Familiar
);
named!(Skill);
named!(
    /// A status effect.
    Effect
);
named!(Monster);
named!(
    /// A symbolic combat action resolved to a macro at compile time.
    Action
);
named!(
    /// An adventuring location.
    Location
);

const NONE: &str = "none";

impl Item {
    /// Sentinel that keeps a slot empty when placed.
    pub fn none() -> Self {
        Self::new(NONE)
    }

    pub fn is_none(&self) -> bool {
        self.0 == NONE
    }
}

impl Familiar {
    /// Sentinel for "no active companion".
    pub fn none() -> Self {
        Self::new(NONE)
    }

    pub fn is_none(&self) -> bool {
        self.0 == NONE
    }
}

/// Body slots that can hold an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    Weapon,
    OffHand,
    Hat,
    Back,
    Shirt,
    Pants,
    Acc1,
    Acc2,
    Acc3,
    /// Equipment worn by the active companion.
    Familiar,
}

impl Slot {
    /// Non-accessory slots, in the order they are committed.
    pub const NON_ACCESSORY: [Slot; 7] = [
        Slot::Weapon,
        Slot::OffHand,
        Slot::Hat,
        Slot::Back,
        Slot::Shirt,
        Slot::Pants,
        Slot::Familiar,
    ];

    pub const ACCESSORIES: [Slot; 3] = [Slot::Acc1, Slot::Acc2, Slot::Acc3];

    pub fn is_accessory(self) -> bool {
        matches!(self, Slot::Acc1 | Slot::Acc2 | Slot::Acc3)
    }

    pub fn label(self) -> &'static str {
        match self {
            Slot::Weapon => "weapon",
            Slot::OffHand => "off-hand",
            Slot::Hat => "hat",
            Slot::Back => "back",
            Slot::Shirt => "shirt",
            Slot::Pants => "pants",
            Slot::Acc1 => "acc1",
            Slot::Acc2 => "acc2",
            Slot::Acc3 => "acc3",
            Slot::Familiar => "familiar",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Positions in which a companion (not an item) rides on a worn carrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiderSlot {
    /// Carried on the back slot item.
    Backpack,
    /// Carried on the hat slot item.
    Throne,
}

impl RiderSlot {
    pub const ALL: [RiderSlot; 2] = [RiderSlot::Backpack, RiderSlot::Throne];

    pub fn other(self) -> RiderSlot {
        match self {
            RiderSlot::Backpack => RiderSlot::Throne,
            RiderSlot::Throne => RiderSlot::Backpack,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiderSlot::Backpack => "backpack",
            RiderSlot::Throne => "throne",
        }
    }
}

impl fmt::Display for RiderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
