//! Persisted settings for the decision engine.
//!
//! The top-level [`Settings`] struct is the serde image of the engine's
//! policy state, read from `navgate.toml` at startup and written back by the
//! configuration surface. Every field carries a default so a partial or
//! missing file never fails a load.
//!
//! # Example `navgate.toml`
//!
//! ```toml
//! enabled = true
//! mode = "blacklist"
//! action = "block-tab"
//! blacklist = ["*.facebook.com/*", "*.twitter.com/*"]
//!
//! [schedule]
//! enabled = true
//! days = ["mon", "tue", "wed", "thu", "fri"]
//! time = { start = "09:00", end = "17:00" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::policy::schedule::Schedule;

/// Whether the rule lists denote sites to block or the only sites allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Block a navigation when some blacklist rule matches it.
    Blacklist,
    /// Block a navigation unless some whitelist rule matches it.
    Whitelist,
}

/// Effect taken when the engine decides to intervene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Steer the navigation to the internal blocked page.
    BlockTab,
    /// Steer the navigation to the configured redirect URL.
    RedirectToUrl,
    /// Close the originating tab.
    CloseTab,
}

/// Engine settings as persisted by the configuration source/sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub enabled: bool,
    /// Enable the engine at load time regardless of the persisted
    /// `enabled` flag.
    #[serde(default)]
    pub enable_on_startup: bool,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_action")]
    pub action: Action,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub redirect_url: String,
    /// Grace window, in seconds, before a consumed one-shot override is
    /// dropped from the store.
    #[serde(default = "default_unblock_once_timeout")]
    pub unblock_once_timeout: u64,
    // Last so scalar values serialize ahead of the sub-table.
    #[serde(default)]
    pub schedule: Schedule,
}

fn default_mode() -> Mode {
    Mode::Blacklist
}

fn default_action() -> Action {
    Action::BlockTab
}

fn default_unblock_once_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: false,
            enable_on_startup: false,
            mode: default_mode(),
            action: default_action(),
            blacklist: Vec::new(),
            whitelist: Vec::new(),
            redirect_url: String::new(),
            unblock_once_timeout: default_unblock_once_timeout(),
            schedule: Schedule::default(),
        }
    }
}

impl Settings {
    /// Load and parse settings from a TOML file at the given path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Serialize settings to a TOML file at the given path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Normalize a user-supplied redirect URL.
///
/// The value must parse as an absolute URL carrying a scheme; anything else
/// is coerced to the empty string so a later redirect action falls back to
/// the internal blocked page instead of navigating to garbage.
pub fn sanitize_redirect_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) if !parsed.scheme().is_empty() => parsed.to_string(),
        _ => String::new(),
    }
}
