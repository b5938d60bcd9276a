//! Host shell boundary: where the panel lives and which surface has focus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use log::debug;

use crate::panel::InspectorPanel;
use crate::signal::Signal;

/// The application shell hosting the panel.
///
/// Implementations own attachment and visibility and report them through
/// [`InspectorPanel::set_attached`] / [`InspectorPanel::set_visible`].
pub trait Shell: Send + Sync {
    /// Attach the panel beside the main area without activating it.
    fn add(&self, panel: &Arc<InspectorPanel>);

    /// Bring the widget with `id` to the foreground.
    fn activate(&self, id: &str);
}

/// A shell with no windows: attaching makes the panel visible.
#[derive(Default)]
pub struct HeadlessShell {
    panels: StdMutex<Vec<Arc<InspectorPanel>>>,
    activations: AtomicUsize,
    last_activated: StdMutex<Option<String>>,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times [`Shell::activate`] was called.
    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// The id most recently passed to [`Shell::activate`].
    pub fn last_activated(&self) -> Option<String> {
        self.last_activated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Simulate the user closing the panel's tab without disposing it.
    pub fn detach(&self, id: &str) {
        let mut panels = self.panels.lock().unwrap_or_else(PoisonError::into_inner);
        panels.retain(|panel| {
            if panel.id() == id {
                panel.set_attached(false);
                false
            } else {
                true
            }
        });
    }
}

impl Shell for HeadlessShell {
    fn add(&self, panel: &Arc<InspectorPanel>) {
        debug!("[shell] attaching {}", panel.id());
        panel.set_attached(true);
        let mut panels = self.panels.lock().unwrap_or_else(PoisonError::into_inner);
        panels.retain(|p| !p.is_disposed());
        panels.push(panel.clone());
    }

    fn activate(&self, id: &str) {
        let panels = self.panels.lock().unwrap_or_else(PoisonError::into_inner);
        for panel in panels.iter().filter(|p| p.id() == id) {
            panel.set_visible(true);
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        *self
            .last_activated
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id.to_string());
    }
}

/// Tracks which surface (console or notebook id) currently has focus.
#[derive(Default)]
pub struct FocusTracker {
    current: StdMutex<Option<String>>,
    current_changed: Signal<Option<String>>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_changed(&self) -> &Signal<Option<String>> {
        &self.current_changed
    }

    /// Move focus. Emits only when the focused id actually changes.
    pub fn focus(&self, id: Option<&str>) {
        let next = id.map(str::to_string);
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == next {
                return;
            }
            *current = next.clone();
        }
        self.current_changed.emit(&next);
    }
}
