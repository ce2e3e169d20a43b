// Configuration management module
// Handles loading, saving, and validating configuration, including the
// persisted Last.fm session obtained through `login`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::lastfm::LastfmSession;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last.fm API credentials and stored session
    pub lastfm: LastfmConfig,

    /// Text cleanup configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LastfmConfig {
    pub api_key: String,
    pub api_secret: String,

    /// Filled in by the interactive login flow
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Enable text cleanup before submissions
    pub enabled: bool,

    /// Regex patterns removed from track/album/artist names, in order
    pub patterns: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            patterns: vec![
                r"\s*\[Explicit\]".to_string(),
                r"\s*\[Clean\]".to_string(),
                r"\s*\(Explicit\)".to_string(),
                r"\s*\(Clean\)".to_string(),
                r"\s*- Explicit".to_string(),
                r"\s*- Clean".to_string(),
            ],
        }
    }
}

impl Config {
    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;

        Ok(config_dir.join("lastfm_scrobbler.conf"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            log::info!("Config file not found, creating default at {:?}", config_path);
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        log::info!("Config saved to {:?}", config_path);

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.lastfm.api_key.is_empty() {
            anyhow::bail!(
                "Last.fm api_key is required; add it to {:?}",
                Self::config_path()?
            );
        }
        if self.lastfm.api_secret.is_empty() {
            anyhow::bail!(
                "Last.fm api_secret is required; add it to {:?}",
                Self::config_path()?
            );
        }

        if self.lastfm.session_key.is_none() {
            log::warn!("No stored session; run `login` before scrobbling");
        }

        Ok(())
    }

    /// The session persisted by a previous login, if any
    pub fn session(&self) -> Option<LastfmSession> {
        match (&self.lastfm.session_key, &self.lastfm.username) {
            (Some(session_key), Some(username)) => Some(LastfmSession {
                session_key: session_key.clone(),
                username: username.clone(),
            }),
            _ => None,
        }
    }

    /// Persist a freshly obtained session
    pub fn store_session(&mut self, session: &LastfmSession) {
        self.lastfm.session_key = Some(session.session_key.clone());
        self.lastfm.username = Some(session.username.clone());
    }

    /// Forget the stored session (logout)
    pub fn clear_session(&mut self) {
        self.lastfm.session_key = None;
        self.lastfm.username = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_requires_both_key_and_username() {
        let mut config = Config::default();
        assert!(config.session().is_none());

        config.lastfm.session_key = Some("key".to_string());
        assert!(config.session().is_none());

        config.lastfm.username = Some("kale".to_string());
        let session = config.session().unwrap();
        assert_eq!(session.session_key, "key");
        assert_eq!(session.username, "kale");
    }

    #[test]
    fn clear_session_removes_stored_credentials() {
        let mut config = Config::default();
        config.store_session(&LastfmSession {
            session_key: "key".to_string(),
            username: "kale".to_string(),
        });
        assert!(config.session().is_some());

        config.clear_session();
        assert!(config.session().is_none());
    }
}
