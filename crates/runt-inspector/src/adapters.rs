//! Wires editor surfaces to inspection handlers and keeps the manager's
//! source pointed at whichever tracked surface has focus.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, Weak};

use log::{debug, warn};

use crate::connector::KernelConnector;
use crate::editor::CodeEditor;
use crate::handler::{HandlerOptions, InspectionHandler};
use crate::inspectable::SourceHandle;
use crate::manager::InspectorManager;
use crate::rendermime::RenderMime;
use crate::settings::InspectorSettings;
use crate::shell::FocusTracker;
use crate::signal::SlotId;
use crate::surface::{Cell, EditorSurface, SurfaceKind};

/// Handlers of the tracked surfaces, keyed by surface id.
pub type HandlerRegistry = Arc<StdMutex<HashMap<String, Arc<InspectionHandler>>>>;

/// Inspection for every surface of one kind (consoles or notebooks).
pub struct SurfaceInspection<S: EditorSurface> {
    manager: Arc<InspectorManager>,
    focus: Arc<FocusTracker>,
    settings: InspectorSettings,
    rendermime: Arc<RenderMime>,
    handlers: HandlerRegistry,
    focus_slot: SlotId,
    _surface: PhantomData<fn(Arc<S>)>,
}

impl<S: EditorSurface> SurfaceInspection<S> {
    pub fn new(
        manager: Arc<InspectorManager>,
        focus: Arc<FocusTracker>,
        settings: InspectorSettings,
    ) -> Self {
        let handlers: HandlerRegistry = Arc::default();

        let registry = handlers.clone();
        let target = Arc::downgrade(&manager);
        let focus_slot = focus
            .current_changed()
            .connect(move |id: &Option<String>| {
                if let (Some(id), Some(manager)) = (id, target.upgrade()) {
                    set_source_for(&registry, &manager, id);
                }
            });

        let rendermime = Arc::new(settings.rendermime());
        Self {
            manager,
            focus,
            settings,
            rendermime,
            handlers,
            focus_slot,
            _surface: PhantomData,
        }
    }

    pub fn handlers(&self) -> HandlerRegistry {
        self.handlers.clone()
    }

    pub fn handler_for(&self, id: &str) -> Option<Arc<InspectionHandler>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Start inspecting `surface`: one handler per surface, following its
    /// active cell until the surface is disposed.
    pub fn track(&self, surface: &Arc<S>) -> Arc<InspectionHandler> {
        let connector =
            KernelConnector::new(surface.session()).with_detail_level(self.settings.detail_level);
        let handler = InspectionHandler::new(HandlerOptions {
            connector,
            rendermime: self.rendermime.clone(),
            debounce: self.settings.debounce(),
        });

        let id = surface.id().to_string();
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), handler.clone());
        debug!("[inspector] Tracking {:?} {}", surface.kind(), id);

        if let Some(cell) = surface.active_cell() {
            handler.set_editor(Some(cell.editor() as Arc<dyn CodeEditor>));
        }

        let weak_handler = Arc::downgrade(&handler);
        let weak_surface = Arc::downgrade(surface);
        let kind = surface.kind();
        surface
            .active_cell_changed()
            .connect(move |cell: &Option<Arc<Cell>>| {
                on_active_cell_changed(kind, &weak_handler, &weak_surface, cell.clone());
            });

        let registry = self.handlers.clone();
        let disposing = handler.clone();
        surface.disposed().connect(move |_| {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            disposing.dispose();
        });

        handler
    }

    /// Point the manager at the focused surface, if it is one of ours.
    pub fn restored(&self) {
        if let Some(id) = self.focus.current() {
            set_source_for(&self.handlers, &self.manager, &id);
        }
    }
}

impl<S: EditorSurface> Drop for SurfaceInspection<S> {
    fn drop(&mut self) {
        self.focus.current_changed().disconnect(self.focus_slot);
    }
}

fn set_source_for(registry: &HandlerRegistry, manager: &InspectorManager, id: &str) {
    let handler = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned();
    if let Some(handler) = handler {
        manager.set_source(Some(handler as SourceHandle));
    }
}

fn on_active_cell_changed<S: EditorSurface>(
    kind: SurfaceKind,
    handler: &Weak<InspectionHandler>,
    surface: &Weak<S>,
    cell: Option<Arc<Cell>>,
) {
    let Some(cell) = cell else {
        // A console without a prompt has nothing to inspect; a notebook
        // keeps its last cell bound.
        if kind == SurfaceKind::Console {
            if let Some(handler) = handler.upgrade() {
                handler.set_editor(None);
            }
        }
        return;
    };

    if cell.is_ready() {
        if let Some(handler) = handler.upgrade() {
            handler.set_editor(Some(cell.editor() as Arc<dyn CodeEditor>));
        }
        return;
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("[inspector] no async runtime, cannot wait for cell {}", cell.id());
        return;
    };
    let handler = handler.clone();
    let surface = surface.clone();
    runtime.spawn(async move {
        cell.ready().await;
        let (Some(handler), Some(surface)) = (handler.upgrade(), surface.upgrade()) else {
            return;
        };
        let still_active = surface
            .active_cell()
            .is_some_and(|active| Arc::ptr_eq(&active, &cell));
        if still_active {
            handler.set_editor(Some(cell.editor() as Arc<dyn CodeEditor>));
        } else {
            debug!("[inspector] cell {} no longer active, not binding", cell.id());
        }
    });
}
