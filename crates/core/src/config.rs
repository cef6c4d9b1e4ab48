use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

/// Browser/session defaults applied when a tool call does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Browser engine to launch: "chrome", "edge" or "firefox".
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Launch a visible browser window instead of headless.
    #[serde(default)]
    pub headed: bool,
    /// Default session name used when a tool call omits one.
    #[serde(default = "default_session")]
    pub session: String,
    /// Explicit user-data directory; one is derived per session when unset.
    #[serde(default)]
    pub profile_dir: Option<String>,
}

fn default_engine() -> String {
    "chrome".to_string()
}

fn default_session() -> String {
    "default".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            headed: false,
            session: default_session(),
            profile_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let path = paths.config_file();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.browser.engine, "chrome");
        assert_eq!(config.browser.session, "default");
        assert!(!config.browser.headed);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let mut config = Config::default();
        config.browser.headed = true;
        config.browser.engine = "edge".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(loaded.browser.headed);
        assert_eq!(loaded.browser.engine, "edge");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(tmp.path().to_path_buf());
        let config = Config::load_or_default(&paths).unwrap();
        assert_eq!(config.browser.engine, "chrome");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"browser":{"headed":true}}"#).unwrap();
        assert!(config.browser.headed);
        assert_eq!(config.browser.session, "default");
    }
}
