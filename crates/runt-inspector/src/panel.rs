//! The display panel: one visible piece of content, one optional source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};

use log::debug;

use crate::inspectable::{live_source, same_source, InspectionUpdate, SourceHandle};
use crate::rendermime::RenderedContent;
use crate::signal::{Signal, SlotId};

/// Shown when there is nothing to display.
pub const DEFAULT_PLACEHOLDER: &str = "Click on a function to see documentation.";

/// What the panel currently shows.
#[derive(Debug, Clone)]
pub enum PanelContent {
    Placeholder(String),
    Rendered(Arc<RenderedContent>),
}

impl PanelContent {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, PanelContent::Placeholder(_))
    }

    pub fn rendered(&self) -> Option<&Arc<RenderedContent>> {
        match self {
            PanelContent::Rendered(content) => Some(content),
            PanelContent::Placeholder(_) => None,
        }
    }
}

/// Slots held on the bound source; released when the source changes.
struct SourceBinding {
    source: SourceHandle,
    inspected: SlotId,
    cleared: SlotId,
    disposed: SlotId,
}

impl SourceBinding {
    fn release(self) -> SourceHandle {
        self.source.inspected().disconnect(self.inspected);
        self.source.cleared().disconnect(self.cleared);
        self.source.disposed().disconnect(self.disposed);
        self.source
    }
}

/// Identity of a source, captured by the slots the panel connects to it.
fn source_key(source: &SourceHandle) -> usize {
    Arc::as_ptr(source) as *const () as usize
}

struct PanelState {
    content: PanelContent,
    source: Option<SourceBinding>,
}

impl PanelState {
    fn is_bound_to(&self, key: usize) -> bool {
        self.source
            .as_ref()
            .is_some_and(|binding| source_key(&binding.source) == key)
    }
}

pub struct InspectorPanel {
    id: String,
    label: String,
    placeholder: String,
    state: StdMutex<PanelState>,
    attached: AtomicBool,
    visible: AtomicBool,
    disposed: AtomicBool,
    content_changed: Signal<PanelContent>,
    this: Weak<InspectorPanel>,
}

impl InspectorPanel {
    pub fn new(id: &str, label: &str, placeholder: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id: id.to_string(),
            label: label.to_string(),
            placeholder: placeholder.to_string(),
            state: StdMutex::new(PanelState {
                content: PanelContent::Placeholder(placeholder.to_string()),
                source: None,
            }),
            attached: AtomicBool::new(false),
            visible: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            content_changed: Signal::new(),
            this: this.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> PanelContent {
        self.lock().content.clone()
    }

    /// Fired after the displayed content was swapped.
    pub fn content_changed(&self) -> &Signal<PanelContent> {
        &self.content_changed
    }

    pub fn source(&self) -> Option<SourceHandle> {
        self.lock().source.as_ref().map(|b| b.source.clone())
    }

    /// Bind the panel to `source`.
    ///
    /// The previous source is disconnected and put on standby, since nothing
    /// displays it anymore. A disposed candidate binds nothing. Does not
    /// trigger an inspection; that is the caller's job.
    pub fn set_source(&self, source: Option<SourceHandle>) {
        if self.is_disposed() {
            return;
        }
        let source = live_source(source);

        let previous = {
            let mut state = self.lock();
            let unchanged = match (&state.source, &source) {
                (Some(bound), Some(candidate)) => same_source(&bound.source, candidate),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            state.source.take()
        };

        if let Some(previous) = previous {
            let previous = previous.release();
            previous.set_standby(true);
        }

        let Some(source) = source else {
            return;
        };

        // An emission already in progress when the source is unbound still
        // reaches these slots, so each one names the source it came from.
        let key = source_key(&source);
        let this = self.this.clone();
        let inspected = source.inspected().connect(move |update: &InspectionUpdate| {
            if let Some(panel) = this.upgrade() {
                panel.on_inspector_update(key, update);
            }
        });
        let this = self.this.clone();
        let cleared = source.cleared().connect(move |_| {
            if let Some(panel) = this.upgrade() {
                panel.mount(panel.placeholder(), Some(key));
            }
        });
        let this = self.this.clone();
        let disposed = source.disposed().connect(move |_| {
            if let Some(panel) = this.upgrade() {
                panel.on_source_disposed(key);
            }
        });

        self.lock().source = Some(SourceBinding {
            source,
            inspected,
            cleared,
            disposed,
        });
    }

    fn on_inspector_update(&self, key: usize, update: &InspectionUpdate) {
        let content = match &update.content {
            Some(content) => PanelContent::Rendered(content.clone()),
            None => self.placeholder(),
        };
        self.mount(content, Some(key));
    }

    fn on_source_disposed(&self, key: usize) {
        if !self.lock().is_bound_to(key) {
            return;
        }
        debug!("[panel] source disposed, unbinding");
        self.set_source(None);
        self.mount(self.placeholder(), None);
    }

    fn placeholder(&self) -> PanelContent {
        PanelContent::Placeholder(self.placeholder.clone())
    }

    /// Replace the displayed content unless it is already shown. With `from`,
    /// only while that source is still the bound one.
    fn mount(&self, content: PanelContent, from: Option<usize>) {
        if self.is_disposed() {
            return;
        }
        {
            let mut state = self.lock();
            if from.is_some_and(|key| !state.is_bound_to(key)) {
                debug!("[panel] dropping update from unbound source");
                return;
            }
            let same = match (&state.content, &content) {
                (PanelContent::Rendered(a), PanelContent::Rendered(b)) => Arc::ptr_eq(a, b),
                (PanelContent::Placeholder(_), PanelContent::Placeholder(_)) => true,
                _ => false,
            };
            if same {
                return;
            }
            // The old content is dropped here
            state.content = content.clone();
        }
        self.content_changed.emit(&content);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::SeqCst);
        if !attached {
            self.visible.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Unbind the source, then tear down. Idempotent.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.set_source(None);
        self.disposed.store(true, Ordering::SeqCst);
        self.set_attached(false);
        self.content_changed.clear();
    }
}
