//! Inspector preferences.
//!
//! Settings are stored in a JSON file in the user's config directory:
//! - macOS: ~/Library/Application Support/runt-inspector/settings.json
//! - Linux: ~/.config/runt-inspector/settings.json
//! - Windows: C:\Users\<User>\AppData\Roaming\runt-inspector\settings.json

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::connector::DEFAULT_DETAIL_LEVEL;
use crate::handler::DEFAULT_DEBOUNCE;
use crate::panel::DEFAULT_PLACEHOLDER;
use crate::rendermime::{RenderMime, DEFAULT_MIME_RANKING};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorSettings {
    /// Quiet period after the last edit before the kernel is asked
    pub debounce_ms: u64,

    /// `detail_level` sent with inspect requests (0 = docstring, 1 = source)
    pub detail_level: usize,

    /// Whether a source bound to the panel updates on every edit.
    /// When false, sources stay paused and only update on trigger.
    pub auto_update: bool,

    /// Panel text shown when there is nothing to display
    pub placeholder: String,

    /// Panel title
    pub label: String,

    /// MIME types to render, most preferred first
    pub mime_ranking: Vec<String>,
}

impl Default for InspectorSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            detail_level: DEFAULT_DETAIL_LEVEL,
            auto_update: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            label: "Contextual Help".to_string(),
            mime_ranking: DEFAULT_MIME_RANKING.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl InspectorSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rendermime(&self) -> RenderMime {
        RenderMime::new(self.mime_ranking.clone())
    }
}

/// Get the path to the settings file
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("runt-inspector")
        .join("settings.json")
}

/// Load settings from `path`, returning defaults if the file is missing or malformed
pub fn load_settings_from(path: &Path) -> InspectorSettings {
    if path.exists() {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    } else {
        InspectorSettings::default()
    }
}

pub fn load_settings() -> InspectorSettings {
    load_settings_from(&settings_path())
}

/// Save settings to `path`, creating parent directories
pub fn save_settings_to(path: &Path, settings: &InspectorSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

pub fn save_settings(settings: &InspectorSettings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}
