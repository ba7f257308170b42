use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::consts::{
    APP_DIR, CONFIG_FILE, DEFAULT_SESSION_WINDOW_MINUTES, DEFAULT_WEEK_WINDOW_MINUTES,
    TRACKER_SUBDIR,
};

/// Tracker settings. Every key is optional, and a key holding the wrong
/// type reads as unset without affecting the others.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub(crate) struct Config {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) session_window_minutes: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) week_window_minutes: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) session_limit_tokens: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) week_limit_tokens: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) timezone: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<toml::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v.clone().try_into::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring config value of unexpected type: {v}");
            None
        }
    }))
}

/// A config together with the path it was (or would have been) read from
#[derive(Debug, Clone)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) path: PathBuf,
}

impl Config {
    pub(crate) fn session_window_minutes(&self) -> i64 {
        self.session_window_minutes
            .unwrap_or(DEFAULT_SESSION_WINDOW_MINUTES)
    }

    pub(crate) fn week_window_minutes(&self) -> i64 {
        self.week_window_minutes.unwrap_or(DEFAULT_WEEK_WINDOW_MINUTES)
    }

    /// Load from `explicit` if given, otherwise from the first existing
    /// default location. Missing or broken files fall back to defaults.
    pub(crate) fn load(explicit: Option<&Path>, codex_home: &Path) -> LoadedConfig {
        let candidates = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => Self::get_config_paths(codex_home),
        };

        for path in &candidates {
            if path.exists()
                && let Some(config) = Self::read(path)
            {
                return LoadedConfig {
                    config,
                    path: path.clone(),
                };
            }
        }

        let path = candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| codex_home.join(TRACKER_SUBDIR).join(CONFIG_FILE));
        LoadedConfig {
            config: Self::default(),
            path,
        }
    }

    fn read(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    fn get_config_paths(codex_home: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Next to the Codex data: ~/.codex/usage_tracker/config.toml
        paths.push(codex_home.join(TRACKER_SUBDIR).join(CONFIG_FILE));

        // 2. Platform config dir: ~/.config/codex-usage/config.toml (Linux),
        //    ~/Library/Application Support/codex-usage/config.toml (macOS)
        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join(APP_DIR).join(CONFIG_FILE);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_keys_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.session_window_minutes(), 300);
        assert_eq!(config.week_window_minutes(), 10_080);
        assert_eq!(config.session_limit_tokens, None);
        assert_eq!(config.week_limit_tokens, None);
    }

    #[test]
    fn explicit_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        fs::write(
            &path,
            "session_window_minutes = 120\nweek_limit_tokens = 5000000\ntimezone = \"UTC\"\n",
        )
        .unwrap();

        let loaded = Config::load(Some(&path), dir.path());
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.config.session_window_minutes(), 120);
        assert_eq!(loaded.config.week_window_minutes(), 10_080);
        assert_eq!(loaded.config.week_limit_tokens, Some(5_000_000));
        assert_eq!(loaded.config.timezone.as_deref(), Some("UTC"));
    }

    #[test]
    fn mistyped_key_keeps_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        fs::write(
            &path,
            "session_window_minutes = \"soon\"\nweek_limit_tokens = 5000\ntimezone = 7\n",
        )
        .unwrap();

        let loaded = Config::load(Some(&path), dir.path());
        assert_eq!(loaded.config.session_window_minutes, None);
        assert_eq!(loaded.config.session_window_minutes(), 300);
        assert_eq!(loaded.config.week_limit_tokens, Some(5000));
        assert_eq!(loaded.config.timezone, None);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "session_window_minutes = = 1").unwrap();

        let loaded = Config::load(Some(&path), dir.path());
        assert_eq!(loaded.config, Config::default());
        assert_eq!(loaded.path, path);
    }

    #[test]
    fn codex_home_location_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = dir.path().join(TRACKER_SUBDIR);
        fs::create_dir_all(&tracker).unwrap();
        fs::write(tracker.join(CONFIG_FILE), "session_limit_tokens = 42\n").unwrap();

        let loaded = Config::load(None, dir.path());
        assert_eq!(loaded.path, tracker.join(CONFIG_FILE));
        assert_eq!(loaded.config.session_limit_tokens, Some(42));
    }
}
