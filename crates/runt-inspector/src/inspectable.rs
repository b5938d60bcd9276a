//! The capability every editor-bound inspection source implements.

use std::sync::Arc;

use crate::rendermime::RenderedContent;
use crate::signal::Signal;

/// An update sent to the display panel.
#[derive(Debug, Clone, Default)]
pub struct InspectionUpdate {
    /// Content to show; `None` means "no information" (placeholder).
    pub content: Option<Arc<RenderedContent>>,
}

/// A source of inspection results for one editor surface.
///
/// Call sites depend on this trait, never on a concrete handler.
pub trait Inspectable: Send + Sync {
    /// Fired when a new inspection result is available.
    fn inspected(&self) -> &Signal<InspectionUpdate>;

    /// Fired when the displayed result should be cleared.
    fn cleared(&self) -> &Signal<()>;

    /// Fired once, when the source is disposed.
    fn disposed(&self) -> &Signal<()>;

    fn is_disposed(&self) -> bool;

    /// Whether the source is paused. A paused source sends no unsolicited
    /// updates; it exists to limit kernel traffic when nothing is visible.
    fn standby(&self) -> bool;

    fn set_standby(&self, standby: bool);

    /// React to an editor change, optionally inspecting `custom_text`
    /// instead of the editor's own text.
    fn on_editor_change(&self, custom_text: Option<&str>);

    /// Run exactly one inspection cycle now, ignoring standby. Standby is
    /// left as it was.
    fn pulse(&self, custom_text: Option<&str>);
}

pub type SourceHandle = Arc<dyn Inspectable>;

/// Pointer identity of two sources (vtables are ignored).
pub fn same_source(a: &SourceHandle, b: &SourceHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Drop a source that is already disposed.
pub fn live_source(source: Option<SourceHandle>) -> Option<SourceHandle> {
    source.filter(|s| !s.is_disposed())
}
