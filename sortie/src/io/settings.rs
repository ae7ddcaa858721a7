//! Session setting overrides that are undone when the engine shuts down.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use crate::io::session::Session;

/// Setting that names the custom combat script.
pub const COMBAT_SCRIPT_SETTING: &str = "customCombatScript";

/// Settings the engine always applies at startup.
pub const STARTUP_SETTINGS: &[(&str, &str)] = &[
    ("logPreferenceChange", "true"),
    ("autoSatisfyWithNPCs", "true"),
    ("autoSatisfyWithCoinmasters", "true"),
    ("dontStopForCounters", "true"),
    ("maximizerFoldables", "true"),
    ("hpAutoRecovery", "-0.05"),
    ("mpAutoRecovery", "-0.05"),
    ("battleAction", "custom combat script"),
    ("choiceAdventureScript", ""),
];

/// Keys that extra settings in the config may not override.
pub const RESERVED_SETTINGS: &[&str] = &["battleAction", COMBAT_SCRIPT_SETTING];

/// Startup table merged with the caller's extras and combat script name.
pub fn startup_settings(
    combat_script: Option<&str>,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut settings: BTreeMap<String, String> = STARTUP_SETTINGS
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    settings.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Some(script) = combat_script {
        settings.insert(COMBAT_SCRIPT_SETTING.to_string(), script.to_string());
    }
    settings
}

/// Records the value each setting had before the engine first changed it.
#[derive(Debug, Default)]
pub struct PropertyOverrides {
    originals: BTreeMap<String, Option<String>>,
}

impl PropertyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value`, remembering the original the first time `key` is touched.
    pub fn set(&mut self, session: &mut dyn Session, key: &str, value: &str) -> Result<()> {
        if !self.originals.contains_key(key) {
            self.originals
                .insert(key.to_string(), session.get_setting(key));
        }
        if session.get_setting(key).as_deref() != Some(value) {
            debug!(key, value, "override setting");
            session.set_setting(key, value)?;
        }
        Ok(())
    }

    pub fn set_all<'a>(
        &mut self,
        session: &mut dyn Session,
        settings: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<()> {
        for (key, value) in settings {
            self.set(session, key, value)?;
        }
        Ok(())
    }

    /// Restore every recorded original. Unset originals are restored as empty.
    pub fn reset_all(&mut self, session: &mut dyn Session) -> Result<()> {
        for (key, original) in std::mem::take(&mut self.originals) {
            let value = original.unwrap_or_default();
            debug!(key = %key, value = %value, "restore setting");
            session.set_setting(&key, &value)?;
        }
        Ok(())
    }
}
