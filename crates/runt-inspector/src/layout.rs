//! Remembers whether the panel was open so the next session can reopen it.
//!
//! Stored as `{"contextual-help": {"open": true}}` in
//! `<data_local_dir>/runt-inspector/layout.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::commands::Action;
use crate::manager::{InspectorManager, PANEL_ID};
use crate::signal::SlotId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetLayout {
    #[serde(default)]
    pub open: bool,
}

/// Saved layout of every restorable widget, keyed by widget name.
pub type LayoutState = BTreeMap<String, WidgetLayout>;

pub fn layout_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("runt-inspector")
        .join("layout.json")
}

/// Read the layout file. Missing or unreadable files yield an empty layout.
pub fn load_layout_from(path: &Path) -> LayoutState {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn save_layout_to(path: &Path, layout: &LayoutState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(layout)?)?;
    Ok(())
}

/// Persists the panel's open state and reopens it on restore.
pub struct LayoutRestorer {
    path: PathBuf,
    manager: Arc<InspectorManager>,
    slot: SlotId,
}

impl LayoutRestorer {
    /// Start recording open/close transitions of `manager` to `path`.
    pub fn new(manager: Arc<InspectorManager>, path: PathBuf) -> Self {
        let file = path.clone();
        let slot = manager.opened_changed().connect(move |open: &bool| {
            let mut layout = load_layout_from(&file);
            layout.insert(PANEL_ID.to_string(), WidgetLayout { open: *open });
            if let Err(e) = save_layout_to(&file, &layout) {
                warn!("[layout] Failed to save {}: {}", file.display(), e);
            }
        });
        Self {
            path,
            manager,
            slot,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The panel's saved layout, if one was ever recorded.
    pub fn saved(&self) -> Option<WidgetLayout> {
        load_layout_from(&self.path).get(PANEL_ID).copied()
    }

    /// Whether the saved layout says the panel was open.
    pub fn was_open(&self) -> bool {
        self.saved().is_some_and(|widget| widget.open)
    }

    /// Reopen the panel if it was open last time. Returns whether it did.
    pub fn restore(&self) -> bool {
        if !self.was_open() || self.manager.is_open() {
            return false;
        }
        info!("[layout] Restoring {}", PANEL_ID);
        self.manager.execute(Action::Toggle { text: None });
        true
    }
}

impl Drop for LayoutRestorer {
    fn drop(&mut self) {
        self.manager.opened_changed().disconnect(self.slot);
    }
}
