//! Classification of wandering noncombat encounters.
//!
//! Some noncombats can interrupt any zone of a given environment. When one
//! shows up, the attempt did not actually visit the task's zone and the body
//! should run again without redoing setup. A few encounter names are shared
//! by unrelated zones, so those are only matched for explicitly listed
//! locations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::Location;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WandererTable {
    /// Environment (e.g. `outdoor`) to encounter names.
    pub environments: BTreeMap<String, BTreeSet<String>>,
    /// Encounters matched only when the last location is listed.
    pub locations: BTreeMap<Location, BTreeSet<String>>,
}

/// What the session reports about the most recent adventure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastAdventure<'a> {
    pub encounter: Option<&'a str>,
    pub location: Option<&'a Location>,
    pub environment: Option<&'a str>,
}

impl WandererTable {
    /// Built-in table for encounters that can appear in many zones.
    pub fn builtin() -> Self {
        let mut table = WandererTable::default();
        for (environment, names) in [
            (
                "outdoor",
                &[
                    "Wooof! Wooooooof!",
                    "Playing Fetch*",
                    "A Pound of Cure",
                    "Aunts not Ants",
                    "Bath Time",
                    "Beware of Aligator",
                    "Delicious Sprouts",
                    "Hypnotic Master",
                    "Lost and Found",
                    "Poetic Justice",
                    "Summer Days",
                    "Teacher's Pet",
                ][..],
            ),
            (
                "indoor",
                &["Wooof! Wooooooof!", "Playing Fetch*", "Time for Lunch"][..],
            ),
            (
                "underground",
                &["Wooof! Wooooooof!", "Playing Fetch*", "Gummy Memories"][..],
            ),
        ] {
            table.add_environment(environment, names.iter().copied());
        }
        table.add_location(
            Location::new("The Haunted Pantry"),
            ["Oh No, Hobo"].into_iter(),
        );
        table
    }

    pub fn add_environment<'a>(
        &mut self,
        environment: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .extend(names.into_iter().map(str::to_string));
    }

    pub fn add_location<'a>(&mut self, location: Location, names: impl IntoIterator<Item = &'a str>) {
        self.locations
            .entry(location)
            .or_default()
            .extend(names.into_iter().map(str::to_string));
    }

    /// Merge `other` over `self`, unioning names per key.
    pub fn extend(&mut self, other: &WandererTable) {
        for (environment, names) in &other.environments {
            self.environments
                .entry(environment.clone())
                .or_default()
                .extend(names.iter().cloned());
        }
        for (location, names) in &other.locations {
            self.locations
                .entry(location.clone())
                .or_default()
                .extend(names.iter().cloned());
        }
    }

    /// True if the last adventure was a wandering noncombat.
    pub fn is_wanderer(&self, last: &LastAdventure<'_>) -> bool {
        let Some(encounter) = last.encounter else {
            return false;
        };

        let listed = last
            .location
            .and_then(|l| self.locations.get(l))
            .is_some_and(|names| names.contains(encounter));
        if listed {
            return true;
        }

        last.environment
            .and_then(|env| self.environments.get(env))
            .is_some_and(|names| names.contains(encounter))
    }
}
