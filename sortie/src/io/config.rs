//! Engine configuration stored as TOML (usually `sortie.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::Skill;
use crate::core::wanderers::WandererTable;
use crate::error::ConfigurationError;
use crate::io::settings::RESERVED_SETTINGS;

/// Engine configuration (TOML).
///
/// Missing fields default to the behavior a plain script expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Continue with a partial outfit when the solver rejects part of a spec.
    pub allow_partial_outfits: bool,

    /// Custom combat script name written at startup.
    pub combat_script: Option<String>,

    /// Base cap on concurrently active songs.
    pub song_limit: usize,

    /// Skill that raises the song cap by one when known.
    pub extra_song_skill: Option<Skill>,

    /// Extra startup setting overrides, applied over the built-in table.
    pub settings: BTreeMap<String, String>,

    /// Extra wandering-noncombat names, merged over the built-in table.
    pub wanderers: WandererTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_partial_outfits: false,
            combat_script: None,
            song_limit: 3,
            extra_song_skill: None,
            settings: BTreeMap::new(),
            wanderers: WandererTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.song_limit == 0 {
            return Err(anyhow!("song_limit must be > 0"));
        }
        if self
            .combat_script
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            return Err(anyhow!("combat_script must not be blank"));
        }
        if let Some(key) = self
            .settings
            .keys()
            .find(|key| RESERVED_SETTINGS.contains(&key.as_str()))
        {
            return Err(ConfigurationError::ReservedSetting(key.clone()).into());
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.song_limit, 3);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("sortie.toml");
        let mut cfg = EngineConfig {
            combat_script: Some("sortie".to_string()),
            extra_song_skill: Some(Skill::new("Mariachi Memory")),
            ..EngineConfig::default()
        };
        cfg.settings
            .insert("hpAutoRecovery".to_string(), "0.2".to_string());
        cfg.wanderers.add_environment("outdoor", ["Goose Chase"]);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sortie.toml");
        fs::write(&path, "allow_partial_outfits = true\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.allow_partial_outfits);
        assert_eq!(cfg.song_limit, 3);
    }

    #[test]
    fn reserved_settings_are_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.settings
            .insert("battleAction".to_string(), "attack".to_string());
        let err = cfg.validate().expect_err("reserved");
        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::ReservedSetting("battleAction".to_string()))
        );
    }

    #[test]
    fn zero_song_limit_is_invalid() {
        let cfg = EngineConfig {
            song_limit: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
