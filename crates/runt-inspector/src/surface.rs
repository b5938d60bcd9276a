//! Editor surfaces: a console with one live prompt, or a notebook of cells.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::watch;

use crate::connector::SessionContext;
use crate::editor::TextEditor;
use crate::signal::Signal;

/// One editable cell. Notebook cells become ready some time after creation.
pub struct Cell {
    id: String,
    editor: Arc<TextEditor>,
    ready: watch::Sender<bool>,
}

impl Cell {
    /// A cell that still has to report ready.
    pub fn new(id: &str, text: &str) -> Arc<Self> {
        let (ready, _) = watch::channel(false);
        Arc::new(Self {
            id: id.to_string(),
            editor: Arc::new(TextEditor::new(text)),
            ready,
        })
    }

    /// A cell that is usable immediately, like a console prompt.
    pub fn new_ready(id: &str, text: &str) -> Arc<Self> {
        let cell = Self::new(id, text);
        cell.mark_ready();
        cell
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn editor(&self) -> Arc<TextEditor> {
        self.editor.clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Resolves once the cell is ready.
    pub async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Console,
    Notebook,
}

/// A focusable document that owns editors and a kernel session.
pub trait EditorSurface: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn kind(&self) -> SurfaceKind;

    fn session(&self) -> Arc<dyn SessionContext>;

    fn active_cell(&self) -> Option<Arc<Cell>>;

    fn active_cell_changed(&self) -> &Signal<Option<Arc<Cell>>>;

    fn disposed(&self) -> &Signal<()>;

    fn is_disposed(&self) -> bool;
}

/// State shared by both surface kinds.
struct SurfaceCore {
    id: String,
    session: Arc<dyn SessionContext>,
    active: StdMutex<Option<Arc<Cell>>>,
    active_cell_changed: Signal<Option<Arc<Cell>>>,
    disposed: Signal<()>,
    is_disposed: AtomicBool,
}

impl SurfaceCore {
    fn new(id: &str, session: Arc<dyn SessionContext>) -> Self {
        Self {
            id: id.to_string(),
            session,
            active: StdMutex::new(None),
            active_cell_changed: Signal::new(),
            disposed: Signal::new(),
            is_disposed: AtomicBool::new(false),
        }
    }

    fn active(&self) -> Option<Arc<Cell>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active(&self, cell: Option<Arc<Cell>>) {
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let unchanged = match (active.as_ref(), cell.as_ref()) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            *active = cell.clone();
        }
        self.active_cell_changed.emit(&cell);
    }

    fn dispose(&self) {
        if self.is_disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disposed.emit(&());
        self.disposed.clear();
        self.active_cell_changed.clear();
    }
}

/// A code console. Only the prompt cell is editable.
pub struct ConsolePanel {
    core: SurfaceCore,
    prompts: StdMutex<u64>,
}

impl ConsolePanel {
    pub fn new(id: &str, session: Arc<dyn SessionContext>) -> Arc<Self> {
        Arc::new(Self {
            core: SurfaceCore::new(id, session),
            prompts: StdMutex::new(0),
        })
    }

    /// Replace the prompt with a fresh one, as after executing the previous.
    pub fn new_prompt(&self, text: &str) -> Arc<Cell> {
        let n = {
            let mut prompts = self.prompts.lock().unwrap_or_else(PoisonError::into_inner);
            *prompts += 1;
            *prompts
        };
        let cell = Cell::new_ready(&format!("{}-prompt-{}", self.core.id, n), text);
        self.core.set_active(Some(cell.clone()));
        cell
    }

    pub fn prompt(&self) -> Option<Arc<Cell>> {
        self.core.active()
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }
}

impl EditorSurface for ConsolePanel {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Console
    }

    fn session(&self) -> Arc<dyn SessionContext> {
        self.core.session.clone()
    }

    fn active_cell(&self) -> Option<Arc<Cell>> {
        self.core.active()
    }

    fn active_cell_changed(&self) -> &Signal<Option<Arc<Cell>>> {
        &self.core.active_cell_changed
    }

    fn disposed(&self) -> &Signal<()> {
        &self.core.disposed
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed.load(Ordering::SeqCst)
    }
}

/// A notebook: many cells, one of them active.
pub struct NotebookPanel {
    core: SurfaceCore,
    cells: StdMutex<Vec<Arc<Cell>>>,
}

impl NotebookPanel {
    pub fn new(id: &str, session: Arc<dyn SessionContext>) -> Arc<Self> {
        Arc::new(Self {
            core: SurfaceCore::new(id, session),
            cells: StdMutex::new(Vec::new()),
        })
    }

    /// Append a cell. It is not ready until [`Cell::mark_ready`] is called.
    pub fn add_cell(&self, text: &str) -> Arc<Cell> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        let cell = Cell::new(&format!("{}-cell-{}", self.core.id, cells.len()), text);
        cells.push(cell.clone());
        cell
    }

    pub fn cells(&self) -> Vec<Arc<Cell>> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active_cell(&self, cell: Option<Arc<Cell>>) {
        self.core.set_active(cell);
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }
}

impl EditorSurface for NotebookPanel {
    fn id(&self) -> &str {
        &self.core.id
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Notebook
    }

    fn session(&self) -> Arc<dyn SessionContext> {
        self.core.session.clone()
    }

    fn active_cell(&self) -> Option<Arc<Cell>> {
        self.core.active()
    }

    fn active_cell_changed(&self) -> &Signal<Option<Arc<Cell>>> {
        &self.core.active_cell_changed
    }

    fn disposed(&self) -> &Signal<()> {
        &self.core.disposed
    }

    fn is_disposed(&self) -> bool {
        self.core.is_disposed.load(Ordering::SeqCst)
    }
}
