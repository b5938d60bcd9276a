//! Per-editor inspection handler.
//!
//! Lifecycle: `Idle → Debouncing → Awaiting → Idle`, and any phase →
//! `Disposed`. Edits re-arm a debounce timer (most recent edit wins); when it
//! fires, one `inspect_request` is issued and tagged with a sequence number.
//! Only the reply to the most recently issued request is ever emitted;
//! superseded replies are dropped on arrival rather than cancelled on the wire.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::connector::{ConnectorError, KernelConnector};
use crate::editor::{char_offset, CodeEditor};
use crate::inspectable::{Inspectable, InspectionUpdate};
use crate::rendermime::RenderMime;
use crate::signal::{Signal, SlotId};

/// Debounce window for editor changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPhase {
    /// Nothing scheduled; a reply may still be outstanding for a pulse.
    Idle,
    /// An edit was seen and the debounce timer is armed.
    Debouncing,
    /// A request was issued and its reply has not arrived yet.
    Awaiting,
    Disposed,
}

pub struct HandlerOptions {
    pub connector: KernelConnector,
    pub rendermime: Arc<RenderMime>,
    pub debounce: Duration,
}

impl HandlerOptions {
    pub fn new(connector: KernelConnector, rendermime: Arc<RenderMime>) -> Self {
        Self {
            connector,
            rendermime,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// The editor a handler currently listens to.
struct EditorBinding {
    editor: Arc<dyn CodeEditor>,
    slot: SlotId,
}

struct HandlerState {
    phase: HandlerPhase,
    standby: bool,
    editor: Option<EditorBinding>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every arm/cancel so a timer that already fired can tell it
    /// was cancelled in the meantime.
    timer_generation: u64,
    /// Custom text from the most recent `on_editor_change` call.
    debounced_text: Option<String>,
    /// Sequence number of the most recently issued request.
    pending: u64,
    /// MIME bundle currently displayed, used to skip identical replies.
    last_bundle: Option<serde_json::Map<String, Value>>,
}

impl HandlerState {
    fn cancel_timer(&mut self) {
        self.timer_generation += 1;
        self.debounced_text = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if self.phase == HandlerPhase::Debouncing {
            self.phase = HandlerPhase::Idle;
        }
    }

    /// Snapshot the text and code point cursor offset to inspect.
    fn request_for(&self, custom_text: Option<String>) -> Option<(String, usize)> {
        let binding = self.editor.as_ref()?;
        if binding.editor.is_disposed() {
            return None;
        }
        let text = custom_text.unwrap_or_else(|| binding.editor.source());
        let offset = char_offset(&text, binding.editor.cursor());
        Some((text, offset))
    }
}

/// Pointer identity of two editors (vtables are ignored).
fn same_editor(a: &Arc<dyn CodeEditor>, b: &Arc<dyn CodeEditor>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

enum Outcome {
    Inspected(InspectionUpdate),
    Cleared,
    Unchanged,
}

pub struct InspectionHandler {
    connector: KernelConnector,
    rendermime: Arc<RenderMime>,
    debounce: Duration,
    state: StdMutex<HandlerState>,
    inspected: Signal<InspectionUpdate>,
    cleared: Signal<()>,
    disposed: Signal<()>,
    this: Weak<InspectionHandler>,
}

impl InspectionHandler {
    /// Create a handler. It starts in standby with no editor bound.
    pub fn new(options: HandlerOptions) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            connector: options.connector,
            rendermime: options.rendermime,
            debounce: options.debounce,
            state: StdMutex::new(HandlerState {
                phase: HandlerPhase::Idle,
                standby: true,
                editor: None,
                timer: None,
                timer_generation: 0,
                debounced_text: None,
                pending: 0,
                last_bundle: None,
            }),
            inspected: Signal::new(),
            cleared: Signal::new(),
            disposed: Signal::new(),
            this: this.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> HandlerPhase {
        self.lock().phase
    }

    pub fn editor(&self) -> Option<Arc<dyn CodeEditor>> {
        self.lock().editor.as_ref().map(|b| b.editor.clone())
    }

    /// Rebind to another editor.
    ///
    /// The previous change listener is always detached first. Binding a new
    /// editor clears the display and schedules one inspection of it;
    /// unbinding emits nothing. Re-assigning the bound editor is a no-op.
    pub fn set_editor(&self, editor: Option<Arc<dyn CodeEditor>>) {
        let previous = {
            let mut state = self.lock();
            if state.phase == HandlerPhase::Disposed {
                return;
            }
            let unchanged = match (state.editor.as_ref(), editor.as_ref()) {
                (Some(bound), Some(next)) => same_editor(&bound.editor, next),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return;
            }
            state.cancel_timer();
            if editor.is_some() {
                state.last_bundle = None;
            }
            state.editor.take()
        };
        if let Some(previous) = previous {
            previous.editor.changed().disconnect(previous.slot);
        }

        let Some(editor) = editor else {
            return;
        };

        let this = self.this.clone();
        let slot = editor.changed().connect(move |_| {
            if let Some(handler) = this.upgrade() {
                handler.on_editor_change(None);
            }
        });
        self.lock().editor = Some(EditorBinding { editor, slot });

        self.cleared.emit(&());
        self.on_editor_change(None);
    }

    /// Dispose the handler: cancel the timer, invalidate any in-flight reply,
    /// detach from the editor and emit `disposed`. Idempotent.
    pub fn dispose(&self) {
        let binding = {
            let mut state = self.lock();
            if state.phase == HandlerPhase::Disposed {
                return;
            }
            state.cancel_timer();
            state.phase = HandlerPhase::Disposed;
            state.pending += 1;
            state.editor.take()
        };
        if let Some(binding) = binding {
            binding.editor.changed().disconnect(binding.slot);
        }
        debug!("[handler] disposed");

        self.disposed.emit(&());
        self.inspected.clear();
        self.cleared.clear();
        self.disposed.clear();
    }

    /// Timer expiry for the debounce armed at `generation`.
    async fn fire(&self, generation: u64) {
        let request = {
            let mut state = self.lock();
            if state.phase != HandlerPhase::Debouncing || state.timer_generation != generation {
                return;
            }
            // This task is the timer; detach it so a later re-arm won't abort
            // the fetch below.
            state.timer = None;
            let custom_text = state.debounced_text.take();
            match state.request_for(custom_text) {
                Some((text, offset)) => {
                    state.pending += 1;
                    state.phase = HandlerPhase::Awaiting;
                    (text, offset, state.pending)
                }
                None => {
                    state.phase = HandlerPhase::Idle;
                    return;
                }
            }
        };

        let (text, offset, seq) = request;
        self.dispatch(text, offset, seq, false).await;
    }

    /// Issue the request tagged `seq` and emit its outcome if it is still current.
    /// With `force`, a reply identical to the last one is emitted anyway.
    async fn dispatch(&self, text: String, offset: usize, seq: u64, force: bool) {
        let result = self.connector.fetch(&text, offset).await;

        let outcome = {
            let mut state = self.lock();
            if state.phase == HandlerPhase::Disposed {
                debug!("[handler] reply #{} arrived after disposal, ignoring", seq);
                return;
            }
            if seq != state.pending {
                debug!(
                    "[handler] stale reply #{} (latest is #{}), ignoring",
                    seq, state.pending
                );
                return;
            }
            if state.phase == HandlerPhase::Awaiting {
                state.phase = HandlerPhase::Idle;
            }

            match result {
                Ok(reply) if reply.found => {
                    let bundle = RenderMime::bundle(&reply.data);
                    if !force && state.last_bundle.as_ref() == Some(&bundle) {
                        Outcome::Unchanged
                    } else {
                        let content = self.rendermime.render(&bundle);
                        state.last_bundle = content.as_ref().map(|_| bundle);
                        Outcome::Inspected(InspectionUpdate { content })
                    }
                }
                Ok(_) => {
                    state.last_bundle = None;
                    Outcome::Inspected(InspectionUpdate::default())
                }
                Err(e) => {
                    state.last_bundle = None;
                    match e {
                        ConnectorError::NotReady | ConnectorError::Cancelled => {
                            debug!("[handler] inspection unavailable: {}", e)
                        }
                        ConnectorError::Rejected(_) | ConnectorError::Transport(_) => {
                            warn!("[handler] inspection failed: {}", e)
                        }
                    }
                    Outcome::Cleared
                }
            }
        };

        match outcome {
            Outcome::Inspected(update) => self.inspected.emit(&update),
            Outcome::Cleared => self.cleared.emit(&()),
            Outcome::Unchanged => {}
        }
    }
}

impl Inspectable for InspectionHandler {
    fn inspected(&self) -> &Signal<InspectionUpdate> {
        &self.inspected
    }

    fn cleared(&self) -> &Signal<()> {
        &self.cleared
    }

    fn disposed(&self) -> &Signal<()> {
        &self.disposed
    }

    fn is_disposed(&self) -> bool {
        self.phase() == HandlerPhase::Disposed
    }

    fn standby(&self) -> bool {
        self.lock().standby
    }

    fn set_standby(&self, standby: bool) {
        let mut state = self.lock();
        if state.phase == HandlerPhase::Disposed {
            return;
        }
        if standby {
            // Parking always forgets the last reply, even when already paused
            state.last_bundle = None;
        }
        if state.standby == standby {
            return;
        }
        state.standby = standby;
        if standby {
            state.cancel_timer();
        }
        debug!("[handler] standby={}", standby);
    }

    fn on_editor_change(&self, custom_text: Option<&str>) {
        let mut state = self.lock();
        if state.phase == HandlerPhase::Disposed || state.standby {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[handler] no async runtime, dropping editor change");
            return;
        };

        state.cancel_timer();
        state.debounced_text = custom_text.map(str::to_string);
        state.phase = HandlerPhase::Debouncing;
        let generation = state.timer_generation;

        let this = self.this.clone();
        let delay = self.debounce;
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(handler) = this.upgrade() {
                handler.fire(generation).await;
            }
        }));
    }

    fn pulse(&self, custom_text: Option<&str>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[handler] no async runtime, dropping pulse");
            return;
        };

        let (text, offset, seq) = {
            let mut state = self.lock();
            if state.phase == HandlerPhase::Disposed {
                return;
            }
            state.cancel_timer();
            let Some((text, offset)) = state.request_for(custom_text.map(str::to_string)) else {
                return;
            };
            state.pending += 1;
            state.phase = HandlerPhase::Awaiting;
            (text, offset, state.pending)
        };

        let Some(this) = self.this.upgrade() else {
            return;
        };
        runtime.spawn(async move {
            this.dispatch(text, offset, seq, true).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{KernelChannel, KernelSession};
    use crate::editor::TextEditor;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use jupyter_protocol::{InspectReply, InspectRequest, Media, MediaType, ReplyStatus};
    use tokio::sync::oneshot;

    type Reply = Result<InspectReply, ConnectorError>;

    /// A kernel whose replies are released by the test.
    #[derive(Default)]
    struct ScriptedKernel {
        calls: StdMutex<Vec<(String, usize, Option<oneshot::Sender<Reply>>)>>,
    }

    impl ScriptedKernel {
        fn codes(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(code, _, _)| code.clone())
                .collect()
        }

        fn offsets(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|(_, o, _)| *o).collect()
        }

        fn reply(&self, index: usize, reply: Reply) {
            let sender = self.calls.lock().unwrap()[index].2.take().unwrap();
            let _ = sender.send(reply);
        }
    }

    impl KernelChannel for ScriptedKernel {
        fn inspect(&self, request: InspectRequest) -> BoxFuture<'static, Reply> {
            let (tx, rx) = oneshot::channel();
            self.calls
                .lock()
                .unwrap()
                .push((request.code, request.cursor_pos, Some(tx)));
            rx.map(|r| r.unwrap_or(Err(ConnectorError::Cancelled))).boxed()
        }
    }

    fn docs(text: &str) -> Reply {
        Ok(InspectReply {
            found: true,
            data: Media {
                content: vec![MediaType::Plain(text.to_string())],
            },
            metadata: Default::default(),
            status: ReplyStatus::Ok,
            error: None,
        })
    }

    fn not_found() -> Reply {
        Ok(InspectReply {
            found: false,
            data: Media { content: vec![] },
            metadata: Default::default(),
            status: ReplyStatus::Ok,
            error: None,
        })
    }

    struct Fixture {
        kernel: Arc<ScriptedKernel>,
        handler: Arc<InspectionHandler>,
        editor: Arc<TextEditor>,
        updates: Arc<StdMutex<Vec<Option<String>>>>,
        cleared: Arc<StdMutex<usize>>,
    }

    fn fixture() -> Fixture {
        let kernel = Arc::new(ScriptedKernel::default());
        let session = Arc::new(KernelSession::with_kernel(kernel.clone()));
        let handler = InspectionHandler::new(HandlerOptions::new(
            KernelConnector::new(session),
            Arc::new(RenderMime::default()),
        ));

        let updates = Arc::new(StdMutex::new(Vec::new()));
        let u = updates.clone();
        handler.inspected().connect(move |update: &InspectionUpdate| {
            let text = update
                .content
                .as_ref()
                .and_then(|c| c.text().map(str::to_string));
            u.lock().unwrap().push(text);
        });
        let cleared = Arc::new(StdMutex::new(0));
        let c = cleared.clone();
        handler.cleared().connect(move |_| *c.lock().unwrap() += 1);

        let editor = Arc::new(TextEditor::new(""));
        handler.set_standby(false);
        handler.set_editor(Some(editor.clone()));

        Fixture {
            kernel,
            handler,
            editor,
            updates,
            cleared,
        }
    }

    async fn past_debounce() {
        tokio::time::sleep(DEFAULT_DEBOUNCE + Duration::from_millis(50)).await;
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_within_window_coalesce_to_last_text() {
        let f = fixture();
        past_debounce().await;
        let baseline = f.kernel.codes().len();

        f.handler.on_editor_change(Some("foo"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.handler.on_editor_change(Some("foobar"));
        assert_eq!(f.handler.phase(), HandlerPhase::Debouncing);

        past_debounce().await;

        let codes = f.kernel.codes();
        assert_eq!(codes.len(), baseline + 1);
        assert_eq!(codes.last().unwrap(), "foobar");
        assert_eq!(f.handler.phase(), HandlerPhase::Awaiting);

        f.kernel.reply(codes.len() - 1, docs("docs for foobar"));
        settle().await;

        assert_eq!(
            f.updates.lock().unwrap().last().cloned().flatten(),
            Some("docs for foobar".to_string())
        );
        assert_eq!(f.handler.phase(), HandlerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_editor_typing_is_debounced_and_uses_cursor() {
        let f = fixture();
        f.editor.set_source("len");
        f.editor.insert("(x");
        f.editor.set_cursor(2);
        past_debounce().await;

        assert_eq!(f.kernel.codes(), vec!["len(x"]);
        assert_eq!(f.kernel.offsets(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_offset_is_in_code_points() {
        let f = fixture();
        f.editor.set_source("é = len");
        past_debounce().await;

        // 8 bytes but 7 code points
        assert_eq!(f.kernel.offsets(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reply_is_discarded() {
        let f = fixture();
        f.handler.on_editor_change(Some("first"));
        past_debounce().await;
        f.handler.on_editor_change(Some("second"));
        past_debounce().await;
        assert_eq!(f.kernel.codes(), vec!["first", "second"]);

        // Second reply lands first, then the first one straggles in
        f.kernel.reply(1, docs("second docs"));
        settle().await;
        f.kernel.reply(0, docs("first docs"));
        settle().await;

        assert_eq!(
            *f.updates.lock().unwrap(),
            vec![Some("second docs".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_emits_null_content() {
        let f = fixture();
        f.handler.on_editor_change(Some("zzz"));
        past_debounce().await;
        f.kernel.reply(0, not_found());
        settle().await;

        assert_eq!(*f.updates.lock().unwrap(), vec![None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_emits_cleared_and_not_inspected() {
        let f = fixture();
        let cleared_before = *f.cleared.lock().unwrap();

        f.handler.on_editor_change(Some("x"));
        past_debounce().await;
        f.kernel
            .reply(0, Err(ConnectorError::Rejected("NameError: x".into())));
        settle().await;

        assert!(f.updates.lock().unwrap().is_empty());
        assert_eq!(*f.cleared.lock().unwrap(), cleared_before + 1);
        assert_eq!(f.handler.phase(), HandlerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_reply_is_not_reemitted() {
        let f = fixture();
        f.handler.on_editor_change(Some("len"));
        past_debounce().await;
        f.kernel.reply(0, docs("len docs"));
        settle().await;

        f.handler.on_editor_change(Some("len("));
        past_debounce().await;
        f.kernel.reply(1, docs("len docs"));
        settle().await;

        assert_eq!(f.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_repaints_identical_reply() {
        let f = fixture();
        f.handler.set_standby(true);
        f.editor.set_source("len");

        f.handler.pulse(None);
        settle().await;
        f.kernel.reply(0, docs("len docs"));
        settle().await;

        f.handler.pulse(None);
        settle().await;
        f.kernel.reply(1, docs("len docs"));
        settle().await;

        assert_eq!(
            *f.updates.lock().unwrap(),
            vec![Some("len docs".to_string()), Some("len docs".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parking_paused_handler_forgets_last_reply() {
        let f = fixture();
        f.handler.on_editor_change(Some("len"));
        past_debounce().await;

        // The reply lands after the handler was parked
        f.handler.set_standby(true);
        f.kernel.reply(0, docs("len docs"));
        settle().await;
        assert_eq!(f.updates.lock().unwrap().len(), 1);

        // Parked again while already paused, e.g. by a panel unbinding it
        f.handler.set_standby(true);
        f.handler.set_standby(false);
        f.handler.on_editor_change(Some("len("));
        past_debounce().await;
        f.kernel.reply(1, docs("len docs"));
        settle().await;

        assert_eq!(f.updates.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reassigning_bound_editor_is_noop() {
        let f = fixture();
        past_debounce().await;
        let cleared_before = *f.cleared.lock().unwrap();
        let issued = f.kernel.codes().len();

        f.handler.set_editor(Some(f.editor.clone()));
        past_debounce().await;

        assert_eq!(*f.cleared.lock().unwrap(), cleared_before);
        assert_eq!(f.kernel.codes().len(), issued);
        assert_eq!(f.editor.changed().slot_count(), 1);

        f.handler.set_editor(None);
        f.handler.set_editor(None);
        assert_eq!(f.editor.changed().slot_count(), 0);
        assert_eq!(*f.cleared.lock().unwrap(), cleared_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standby_suppresses_requests_and_events() {
        let f = fixture();
        f.handler.set_standby(true);

        for text in ["a", "ab", "abc"] {
            f.editor.set_source(text);
            f.handler.on_editor_change(None);
        }
        past_debounce().await;

        assert!(f.kernel.codes().is_empty());
        assert!(f.updates.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_standby_cancels_armed_timer_without_clearing() {
        let f = fixture();
        let cleared_before = *f.cleared.lock().unwrap();

        f.handler.on_editor_change(Some("pending"));
        f.handler.set_standby(true);
        assert_eq!(f.handler.phase(), HandlerPhase::Idle);
        past_debounce().await;

        assert!(f.kernel.codes().is_empty());
        assert_eq!(*f.cleared.lock().unwrap(), cleared_before);

        // Leaving standby does not re-check retroactively
        f.handler.set_standby(false);
        past_debounce().await;
        assert!(f.kernel.codes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pulse_bypasses_standby_once() {
        let f = fixture();
        f.handler.set_standby(true);
        f.editor.set_source("os.path");

        f.handler.pulse(None);
        settle().await;
        assert_eq!(f.kernel.codes(), vec!["os.path"]);
        assert!(f.handler.standby());

        f.kernel.reply(0, docs("path docs"));
        settle().await;
        assert_eq!(
            *f.updates.lock().unwrap(),
            vec![Some("path docs".to_string())]
        );

        // Still paused afterwards
        f.editor.set_source("os.sep");
        past_debounce().await;
        assert_eq!(f.kernel.codes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_flight_ignores_late_reply() {
        let f = fixture();
        let disposed = Arc::new(StdMutex::new(0));
        let d = disposed.clone();
        f.handler.disposed().connect(move |_| *d.lock().unwrap() += 1);

        f.handler.on_editor_change(Some("slow"));
        past_debounce().await;
        f.handler.dispose();
        f.handler.dispose();

        f.kernel.reply(0, docs("too late"));
        settle().await;

        assert!(f.updates.lock().unwrap().is_empty());
        assert_eq!(*disposed.lock().unwrap(), 1);
        assert!(f.handler.is_disposed());
        assert_eq!(f.editor.changed().slot_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_armed_timer() {
        let f = fixture();
        f.handler.on_editor_change(Some("never"));
        f.handler.dispose();
        past_debounce().await;
        assert!(f.kernel.codes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebinding_detaches_previous_editor() {
        let f = fixture();
        let next = Arc::new(TextEditor::new("next"));
        f.handler.set_editor(Some(next.clone()));
        assert_eq!(f.editor.changed().slot_count(), 0);
        assert_eq!(next.changed().slot_count(), 1);
        past_debounce().await;
        let issued = f.kernel.codes().len();

        // Edits in the old editor are no longer observed
        f.editor.set_source("old edit");
        past_debounce().await;
        assert_eq!(f.kernel.codes().len(), issued);

        f.handler.set_editor(None);
        assert_eq!(next.changed().slot_count(), 0);
        assert!(f.handler.editor().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_editor_clears_and_inspects_it() {
        let f = fixture();
        let cleared_before = *f.cleared.lock().unwrap();
        let next = Arc::new(TextEditor::new("print"));

        f.handler.set_editor(Some(next));
        assert_eq!(*f.cleared.lock().unwrap(), cleared_before + 1);
        past_debounce().await;

        assert_eq!(f.kernel.codes().last().map(String::as_str), Some("print"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbinding_editor_emits_nothing() {
        let f = fixture();
        past_debounce().await;
        let cleared_before = *f.cleared.lock().unwrap();
        let issued = f.kernel.codes().len();

        f.handler.set_editor(None);
        past_debounce().await;

        assert_eq!(*f.cleared.lock().unwrap(), cleared_before);
        assert_eq!(f.kernel.codes().len(), issued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_kernel_clears_without_panicking() {
        let handler = InspectionHandler::new(HandlerOptions::new(
            KernelConnector::new(Arc::new(KernelSession::new())),
            Arc::new(RenderMime::default()),
        ));
        let cleared = Arc::new(StdMutex::new(0));
        let c = cleared.clone();
        handler.cleared().connect(move |_| *c.lock().unwrap() += 1);
        handler.set_standby(false);
        handler.set_editor(Some(Arc::new(TextEditor::new("x"))));
        past_debounce().await;
        settle().await;

        // One for binding the editor, one for the failed fetch
        assert_eq!(*cleared.lock().unwrap(), 2);
    }

    #[test]
    fn test_new_handler_starts_in_standby_and_idle() {
        let handler = InspectionHandler::new(HandlerOptions::new(
            KernelConnector::new(Arc::new(KernelSession::new())),
            Arc::new(RenderMime::default()),
        ));
        assert!(handler.standby());
        assert_eq!(handler.phase(), HandlerPhase::Idle);
        assert!(handler.editor().is_none());
    }
}
