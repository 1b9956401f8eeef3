use crate::character::PetCharacter;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_SNOOZE: Duration = Duration::from_secs(10 * 60);

/// User preferences loaded from `preferences.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub character: PetCharacter,
    pub notifications_enabled: bool,
    pub animation_enabled: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub default_snooze: Duration,
    pub log_level: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            character: PetCharacter::default(),
            notifications_enabled: true,
            animation_enabled: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            default_snooze: DEFAULT_SNOOZE,
            log_level: "info".to_string(),
        }
    }
}

impl Preferences {
    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read preferences {}", path.display()))?;
        Self::parse(&text).with_context(|| {
            format!(
                "failed to parse preferences {} (expected TOML)",
                path.display()
            )
        })
    }

    pub fn parse(text: &str) -> Result<Self> {
        let preferences: Preferences = toml::from_str(text)?;
        if preferences.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }
        if preferences.default_snooze.is_zero() {
            anyhow::bail!("default_snooze must be greater than 0");
        }
        Ok(preferences)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

pub fn ensure_sample_preferences(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create preferences parent directory {}",
                parent.display()
            )
        })?;
    }

    let sample = r#"# PetNudge preferences (TOML)

# One of: cat, dog, rabbit, hamster, parrot, fish
character = "cat"

# Send a system notification when a reminder fires.
notifications_enabled = true

# Animate the menu bar pet when a reminder fires.
animation_enabled = true

# How often reminders are checked, and the default snooze length.
poll_interval = "15s"
default_snooze = "10m"

# error | warn | info | debug | trace (RUST_LOG overrides this)
log_level = "info"
"#;

    std::fs::write(path, sample)
        .with_context(|| format!("failed to write sample preferences {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Preferences, ensure_sample_preferences};
    use crate::character::PetCharacter;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().expect("tempdir");
        let prefs = Preferences::load(&temp.path().join("preferences.toml")).expect("load");
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let prefs = Preferences::parse(
            r#"
character = "parrot"
poll_interval = "30s"
"#,
        )
        .expect("parse");
        assert_eq!(prefs.character, PetCharacter::Parrot);
        assert_eq!(prefs.poll_interval, Duration::from_secs(30));
        assert_eq!(prefs.default_snooze, Duration::from_secs(600));
        assert!(prefs.notifications_enabled);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(Preferences::parse("poll_interval = \"0s\"").is_err());
        assert!(Preferences::parse("character = \"unicorn\"").is_err());
    }

    #[test]
    fn sample_file_parses_back() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("preferences.toml");
        ensure_sample_preferences(&path).expect("write sample");
        let prefs = Preferences::load(&path).expect("load sample");
        assert_eq!(prefs, Preferences::default());
    }
}
