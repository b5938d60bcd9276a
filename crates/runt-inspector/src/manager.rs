//! Single point of truth for which source drives the one display panel.
//!
//! The manager remembers the last assigned source even while no panel is
//! open, so reopening the panel restores the context the user left.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::inspectable::{live_source, SourceHandle};
use crate::panel::InspectorPanel;
use crate::settings::InspectorSettings;
use crate::shell::Shell;
use crate::signal::Signal;

/// Id of the panel widget, also the name its layout is restored under.
pub const PANEL_ID: &str = "contextual-help";

struct ManagerState {
    panel: Option<Arc<InspectorPanel>>,
    remembered: Option<SourceHandle>,
    /// Standby mode given to a source when it gets bound to the panel.
    auto_update: bool,
}

pub struct InspectorManager {
    shell: Arc<dyn Shell>,
    label: String,
    placeholder: String,
    state: StdMutex<ManagerState>,
    opened_changed: Signal<bool>,
}

impl InspectorManager {
    pub fn new(shell: Arc<dyn Shell>, settings: &InspectorSettings) -> Self {
        Self {
            shell,
            label: settings.label.clone(),
            placeholder: settings.placeholder.clone(),
            state: StdMutex::new(ManagerState {
                panel: None,
                remembered: None,
                auto_update: settings.auto_update,
            }),
            opened_changed: Signal::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fired with `true` when a panel is created and `false` when it is closed.
    pub fn opened_changed(&self) -> &Signal<bool> {
        &self.opened_changed
    }

    /// The open panel, if any.
    pub fn panel(&self) -> Option<Arc<InspectorPanel>> {
        self.lock().panel.clone().filter(|p| !p.is_disposed())
    }

    pub fn is_open(&self) -> bool {
        self.panel().is_some()
    }

    /// The source bound to the open panel. `None` while closed.
    pub fn source(&self) -> Option<SourceHandle> {
        self.panel().and_then(|p| p.source())
    }

    /// The last assigned source, kept across close/open.
    pub fn remembered_source(&self) -> Option<SourceHandle> {
        self.lock().remembered.clone()
    }

    pub fn auto_update(&self) -> bool {
        self.lock().auto_update
    }

    /// Whether the bound source is paused. False when nothing is bound.
    pub fn is_standby(&self) -> bool {
        self.source().is_some_and(|s| s.standby())
    }

    /// Assign the source that should drive the panel.
    ///
    /// A disposed source is treated as `None`. If the panel is open it is
    /// rebound immediately.
    pub fn set_source(&self, source: Option<SourceHandle>) {
        let source = live_source(source);
        let (panel, auto_update) = {
            let mut state = self.lock();
            state.remembered = source.clone();
            (
                state.panel.clone().filter(|p| !p.is_disposed()),
                state.auto_update,
            )
        };

        if let Some(panel) = panel {
            panel.set_source(source.clone());
            if let Some(source) = source {
                source.set_standby(!auto_update);
            }
        }
    }

    /// Open the panel, or bring the open one to the front.
    pub fn open(&self, text: Option<&str>) -> Arc<InspectorPanel> {
        let (panel, created) = {
            let mut state = self.lock();
            match state.panel.clone().filter(|p| !p.is_disposed()) {
                Some(panel) => (panel, None),
                None => {
                    let panel = InspectorPanel::new(PANEL_ID, &self.label, &self.placeholder);
                    state.remembered = live_source(state.remembered.take());
                    state.panel = Some(panel.clone());
                    let source = state.remembered.clone();
                    (panel, Some((source, state.auto_update)))
                }
            }
        };

        if let Some((source, auto_update)) = &created {
            panel.set_source(source.clone());
            if let Some(source) = panel.source() {
                source.set_standby(!auto_update);
                source.on_editor_change(text);
            }
            info!("[inspector] Panel opened");
        }

        if !panel.is_attached() {
            self.shell.add(&panel);
        }
        self.shell.activate(panel.id());

        if created.is_some() {
            self.opened_changed.emit(&true);
        }
        panel
    }

    /// Dispose the panel. Sources are left alive and remembered.
    pub fn close(&self) {
        let panel = self.lock().panel.take();
        let Some(panel) = panel.filter(|p| !p.is_disposed()) else {
            return;
        };
        panel.dispose();
        info!("[inspector] Panel closed");
        self.opened_changed.emit(&false);
    }

    pub fn toggle(&self, text: Option<&str>) {
        if self.is_open() {
            self.close();
        } else {
            self.open(text);
        }
    }

    /// Refresh a paused source once, leaving it paused.
    pub fn trigger(&self) {
        match self.source() {
            Some(source) if source.standby() => {
                debug!("[inspector] Trigger");
                source.pulse(None);
            }
            _ => debug!("[inspector] Trigger ignored: no paused source"),
        }
    }

    /// Pause or resume the bound source. Newly bound sources adopt the result.
    pub fn toggle_standby(&self) {
        let Some(source) = self.source() else {
            return;
        };
        let standby = !source.standby();
        source.set_standby(standby);
        self.lock().auto_update = !standby;
        info!(
            "[inspector] Auto update {}",
            if standby { "paused" } else { "resumed" }
        );
    }
}
