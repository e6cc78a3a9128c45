//! Typed view over a parsed configuration document.
//!
//! Every recognized key has an accessor with an explicit default, so the
//! rest of the workspace never touches the raw value map. Unknown keys are
//! kept but ignored.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::value::{parse_document, ConfigValue, OutFileSpec};

/// Candidate configuration filenames, in lookup order.
pub const CONFIG_FILE_CANDIDATES: &[&str] = &["config.txt", "config-sample.txt"];

/// The section the bot reads its keys from, when present.
pub const BOT_SECTION: &str = "CookieBot";

/// Which timestamp components the status logger prefixes lines with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampPrefix {
    pub time: bool,
    pub date: bool,
}

/// The bot's configuration. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct BotConfig {
    values: HashMap<String, ConfigValue>,
}

impl BotConfig {
    /// Parse a configuration document.
    ///
    /// Keys under `[CookieBot]` take effect; when that section is absent
    /// the keys before any section header are used instead.
    pub fn parse(input: &str) -> Self {
        let mut sections = parse_document(input);
        let values = sections
            .remove(BOT_SECTION)
            .or_else(|| sections.remove(""))
            .unwrap_or_default();
        Self { values }
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::parse(&content))
    }

    /// Locate and load a configuration file under `dir`, trying each
    /// candidate filename in order. Returns the path that was used.
    pub fn discover(dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        for name in CONFIG_FILE_CANDIDATES {
            let candidate = dir.join(name);
            if candidate.exists() {
                let config = Self::from_file(&candidate)?;
                return Ok((candidate, config));
            }
        }
        Err(ConfigError::NotFound {
            tried: CONFIG_FILE_CANDIDATES.join(", "),
        })
    }

    /// Raw access, mainly for tests and diagnostics.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    // -- recognized keys ----------------------------------------------------

    /// Browser binary override; `None` means discover a platform default.
    pub fn binary_path(&self) -> Option<&str> {
        self.values.get("binary_path").and_then(ConfigValue::as_str)
    }

    /// Where the save blob is persisted.
    pub fn savefile_path(&self) -> PathBuf {
        self.values
            .get("savefile_path")
            .and_then(ConfigValue::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cookies.save"))
    }

    /// The game URL.
    pub fn url(&self) -> &str {
        self.values
            .get("url")
            .and_then(ConfigValue::as_str)
            .unwrap_or("https://orteil.dashnet.org/cookieclicker/")
    }

    /// Whether to grind out a purchase shortfall with manual clicks.
    pub fn click_missing(&self) -> bool {
        self.values
            .get("click_missing")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false)
    }

    /// Capture a save blob every this many ticks.
    pub fn save_every(&self) -> u32 {
        self.values
            .get("save_every")
            .and_then(ConfigValue::as_int)
            .filter(|n| *n > 0)
            .map(|n| n as u32)
            .unwrap_or(30)
    }

    /// Pause between ticks.
    pub fn sleep_amount(&self) -> Duration {
        let secs = self
            .values
            .get("sleep_amount")
            .and_then(ConfigValue::as_number)
            .filter(|s| *s >= 0.0)
            .unwrap_or(3.0);
        Duration::from_secs_f64(secs)
    }

    /// Upgrade names (lowercased) that are never bought.
    pub fn excluded_upgrades(&self) -> HashSet<String> {
        self.values
            .get("excluded_upgrades")
            .and_then(ConfigValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(ConfigValue::as_str)
                    .map(|s| s.to_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Gate on all status output.
    pub fn verbose(&self) -> bool {
        self.values
            .get("verbose")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(true)
    }

    /// Timestamp components for status lines.
    pub fn timestamp(&self) -> TimestampPrefix {
        let mut prefix = TimestampPrefix::default();
        if let Some(items) = self.values.get("timestamp").and_then(ConfigValue::as_list) {
            for item in items.iter().filter_map(ConfigValue::as_str) {
                match item {
                    "time" => prefix.time = true,
                    "date" => prefix.date = true,
                    _ => {}
                }
            }
        }
        prefix
    }

    /// Status output file, when configured.
    pub fn output_file(&self) -> Option<&OutFileSpec> {
        self.values.get("output_file").and_then(ConfigValue::as_out_file)
    }

    /// Prestige-currency threshold at which the bot resets; `None`
    /// disables resetting.
    pub fn reset_every(&self) -> Option<f64> {
        self.values
            .get("reset_every")
            .and_then(ConfigValue::as_number)
            .filter(|t| *t > 0.0)
    }

    /// Optional hard cap on top-up click iterations per purchase.
    pub fn click_cap(&self) -> Option<u64> {
        self.values
            .get("click_cap")
            .and_then(ConfigValue::as_int)
            .filter(|n| *n > 0)
            .map(|n| n as u64)
    }

    /// When true, any per-tick error stops the loop instead of being
    /// logged and skipped.
    pub fn halt_on_error(&self) -> bool {
        self.values
            .get("halt_on_error")
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_empty() {
        let config = BotConfig::parse("");
        assert_eq!(config.savefile_path(), PathBuf::from("cookies.save"));
        assert!(config.url().contains("cookieclicker"));
        assert!(!config.click_missing());
        assert_eq!(config.save_every(), 30);
        assert_eq!(config.sleep_amount(), Duration::from_secs(3));
        assert!(config.excluded_upgrades().is_empty());
        assert!(config.verbose());
        assert_eq!(config.timestamp(), TimestampPrefix::default());
        assert!(config.output_file().is_none());
        assert!(config.reset_every().is_none());
        assert!(!config.halt_on_error());
        assert!(config.binary_path().is_none());
    }

    #[test]
    fn section_keys_take_effect() {
        let config = BotConfig::parse(
            "[CookieBot]\nverbose = false\nsave_every = 10\nsleep_amount = 0.5\n",
        );
        assert!(!config.verbose());
        assert_eq!(config.save_every(), 10);
        assert_eq!(config.sleep_amount(), Duration::from_secs_f64(0.5));
    }

    #[test]
    fn sectionless_document_uses_preamble() {
        let config = BotConfig::parse("verbose = false\n");
        assert!(!config.verbose());
    }

    #[test]
    fn excluded_upgrades_are_lowercased() {
        let config = BotConfig::parse(r#"excluded_upgrades = ["Golden Switch", "kitten helpers"]"#);
        let excluded = config.excluded_upgrades();
        assert!(excluded.contains("golden switch"));
        assert!(excluded.contains("kitten helpers"));
        assert!(!excluded.contains("Golden Switch"));
    }

    #[test]
    fn timestamp_list_subset() {
        let config = BotConfig::parse(r#"timestamp = ["time"]"#);
        assert_eq!(
            config.timestamp(),
            TimestampPrefix {
                time: true,
                date: false
            }
        );
        let config = BotConfig::parse(r#"timestamp = ["date", "time", "bogus"]"#);
        assert_eq!(
            config.timestamp(),
            TimestampPrefix {
                time: true,
                date: true
            }
        );
    }

    #[test]
    fn reset_every_accepts_int_and_float() {
        assert_eq!(BotConfig::parse("reset_every = 2").reset_every(), Some(2.0));
        assert_eq!(
            BotConfig::parse("reset_every = 1.5").reset_every(),
            Some(1.5)
        );
        assert_eq!(BotConfig::parse("reset_every = 0").reset_every(), None);
    }

    #[test]
    fn discover_prefers_primary_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in CONFIG_FILE_CANDIDATES {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(f, "save_every = {}", name.len()).unwrap();
        }
        let (path, config) = BotConfig::discover(dir.path()).unwrap();
        assert!(path.ends_with("config.txt"));
        assert_eq!(config.save_every(), "config.txt".len() as u32);
    }

    #[test]
    fn discover_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config-sample.txt"), "verbose = false\n").unwrap();
        let (path, config) = BotConfig::discover(dir.path()).unwrap();
        assert!(path.ends_with("config-sample.txt"));
        assert!(!config.verbose());
    }

    #[test]
    fn discover_errors_when_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = BotConfig::discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains("config.txt"));
    }
}
