//! Editor boundary: the change-notification source an inspection handler
//! listens to, plus an in-memory editor used by the CLI and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};

use crate::signal::Signal;

/// An editable region (console prompt or notebook cell).
///
/// `changed` fires on text edits and on cursor moves.
pub trait CodeEditor: Send + Sync {
    /// Full text of the region.
    fn source(&self) -> String;

    /// Cursor position as a byte offset into [`CodeEditor::source`].
    fn cursor(&self) -> usize;

    fn changed(&self) -> &Signal<()>;

    fn is_disposed(&self) -> bool;
}

/// Convert a byte offset into a Unicode code point offset, which is what
/// the Jupyter protocol (5.2+) expects for `cursor_pos`.
///
/// Offsets past the end clamp to the text length; offsets inside a
/// multi-byte character count that character as not yet reached.
pub fn char_offset(text: &str, byte_offset: usize) -> usize {
    text.char_indices()
        .take_while(|(idx, _)| *idx < byte_offset)
        .count()
}

struct Buffer {
    text: String,
    cursor: usize,
}

/// A plain text buffer with a cursor.
pub struct TextEditor {
    buffer: StdMutex<Buffer>,
    changed: Signal<()>,
    disposed: AtomicBool,
}

impl Default for TextEditor {
    fn default() -> Self {
        Self::new("")
    }
}

impl TextEditor {
    /// Create an editor holding `text` with the cursor at the end.
    pub fn new(text: &str) -> Self {
        Self {
            buffer: StdMutex::new(Buffer {
                text: text.to_string(),
                cursor: text.len(),
            }),
            changed: Signal::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Replace the whole text and move the cursor to its end.
    pub fn set_source(&self, text: &str) {
        {
            let mut buffer = self.lock();
            buffer.text = text.to_string();
            buffer.cursor = text.len();
        }
        self.changed.emit(&());
    }

    /// Move the cursor, snapping back to the nearest char boundary.
    pub fn set_cursor(&self, byte_offset: usize) {
        {
            let mut buffer = self.lock();
            let mut offset = byte_offset.min(buffer.text.len());
            while !buffer.text.is_char_boundary(offset) {
                offset -= 1;
            }
            buffer.cursor = offset;
        }
        self.changed.emit(&());
    }

    /// Insert text at the cursor and advance past it.
    pub fn insert(&self, text: &str) {
        {
            let mut buffer = self.lock();
            let at = buffer.cursor;
            buffer.text.insert_str(at, text);
            buffer.cursor = at + text.len();
        }
        self.changed.emit(&());
    }

    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.changed.clear();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CodeEditor for TextEditor {
    fn source(&self) -> String {
        self.lock().text.clone()
    }

    fn cursor(&self) -> usize {
        self.lock().cursor
    }

    fn changed(&self) -> &Signal<()> {
        &self.changed
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}
