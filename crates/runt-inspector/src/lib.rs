//! runt-inspector - Pausable contextual help for Jupyter kernels.
//!
//! As the user edits a console prompt or notebook cell, the handler for that
//! surface debounces the changes, asks the kernel for documentation of the
//! code under the cursor (`inspect_request`), and publishes the rendered
//! result. A single display panel shows the output of whichever handler the
//! focused surface owns.
//!
//! Each handler can be put on standby: it then sends nothing to the kernel
//! until the user asks for one refresh with the trigger action.

pub mod adapters;
pub mod commands;
pub mod connector;
pub mod editor;
pub mod handler;
pub mod inspectable;
pub mod kernel;
pub mod layout;
pub mod manager;
pub mod panel;
pub mod rendermime;
pub mod settings;
pub mod shell;
pub mod signal;
pub mod surface;

pub use adapters::{HandlerRegistry, SurfaceInspection};
pub use commands::{Action, CommandId};
pub use connector::{ConnectorError, KernelChannel, KernelConnector, KernelSession, SessionContext};
pub use editor::{CodeEditor, TextEditor};
pub use handler::{HandlerOptions, HandlerPhase, InspectionHandler};
pub use inspectable::{Inspectable, InspectionUpdate, SourceHandle};
pub use kernel::RuntimeKernel;
pub use manager::{InspectorManager, PANEL_ID};
pub use panel::{InspectorPanel, PanelContent};
pub use rendermime::{RenderMime, RenderedContent};
pub use settings::InspectorSettings;
pub use shell::{FocusTracker, HeadlessShell, Shell};
pub use signal::{Signal, SlotId};
pub use surface::{Cell, ConsolePanel, EditorSurface, NotebookPanel, SurfaceKind};
