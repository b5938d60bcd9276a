//! A [`KernelChannel`] backed by a real Jupyter kernel over ZeroMQ.
//!
//! The shell connection is split into a persistent writer and a reader task.
//! The reader routes each `inspect_reply` to the oneshot registered under the
//! request's msg_id. When the reader dies the router is closed: every pending
//! sender is dropped, the waiting fetches resolve with
//! [`ConnectorError::Cancelled`], and later fetches fail the same way at once.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use jupyter_protocol::{
    ConnectionInfo, InspectReply, InspectRequest, JupyterMessage, JupyterMessageContent,
    KernelInfoRequest, ShutdownRequest,
};
use log::{debug, error, info};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::connector::{ConnectorError, KernelChannel};

/// Pending inspections: msg_id → oneshot sender for routing inspect_reply.
type PendingInspections = HashMap<String, oneshot::Sender<InspectReply>>;

/// Hands each `inspect_reply` to the request waiting for it.
struct ReplyRouter {
    /// `None` once the shell reader has stopped.
    pending: StdMutex<Option<PendingInspections>>,
}

impl ReplyRouter {
    fn new() -> Self {
        Self {
            pending: StdMutex::new(Some(HashMap::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<PendingInspections>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the reply to `msg_id`. Fails if nothing routes replies anymore.
    fn register(&self, msg_id: &str) -> Result<oneshot::Receiver<InspectReply>, ConnectorError> {
        let mut pending = self.lock();
        let Some(pending) = pending.as_mut() else {
            return Err(ConnectorError::Cancelled);
        };
        let (tx, rx) = oneshot::channel();
        pending.insert(msg_id.to_string(), tx);
        Ok(rx)
    }

    fn forget(&self, msg_id: &str) {
        if let Some(pending) = self.lock().as_mut() {
            pending.remove(msg_id);
        }
    }

    /// Deliver `reply` to whoever registered `parent_msg_id`. Returns whether
    /// anyone had.
    fn route(&self, parent_msg_id: &str, reply: InspectReply) -> bool {
        let sender = self
            .lock()
            .as_mut()
            .and_then(|pending| pending.remove(parent_msg_id));
        match sender {
            // Receiver gone means the fetch was superseded
            Some(sender) => {
                let _ = sender.send(reply);
                true
            }
            None => false,
        }
    }

    /// Cancel every waiting request and refuse new ones.
    fn close(&self) {
        if let Some(pending) = self.lock().take() {
            if !pending.is_empty() {
                debug!("[kernel] cancelling {} pending inspections", pending.len());
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, HashMap::len)
    }
}

pub struct RuntimeKernel {
    connection_info: ConnectionInfo,
    connection_file: Option<PathBuf>,
    session_id: String,
    shell_writer: Arc<AsyncMutex<runtimelib::DealerSendConnection>>,
    shell_reader_task: tokio::task::JoinHandle<()>,
    router: Arc<ReplyRouter>,
    /// Set when this process launched the kernel.
    process: StdMutex<Option<tokio::process::Child>>,
}

impl RuntimeKernel {
    /// Launch a kernel from its kernelspec name and connect to it.
    pub async fn start(kernelspec_name: &str) -> Result<Self> {
        let kernelspec = runtimelib::find_kernelspec(kernelspec_name).await?;

        // Reserve ports
        let ip = std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        let ports = runtimelib::peek_ports(ip, 5).await?;

        let connection_info = ConnectionInfo {
            transport: jupyter_protocol::connection_info::Transport::TCP,
            ip: ip.to_string(),
            stdin_port: ports[0],
            control_port: ports[1],
            hb_port: ports[2],
            shell_port: ports[3],
            iopub_port: ports[4],
            signature_scheme: "hmac-sha256".to_string(),
            key: Uuid::new_v4().to_string(),
            kernel_name: Some(kernelspec_name.to_string()),
        };

        let runtime_dir = runtimelib::dirs::runtime_dir();
        tokio::fs::create_dir_all(&runtime_dir).await?;

        let kernel_id: String =
            petname::petname(2, "-").unwrap_or_else(|| Uuid::new_v4().to_string());
        let connection_file_path = runtime_dir.join(format!("runt-inspect-{}.json", kernel_id));

        tokio::fs::write(
            &connection_file_path,
            serde_json::to_string_pretty(&connection_info)?,
        )
        .await?;

        info!(
            "[kernel] Starting {} at {:?}",
            kernelspec_name, connection_file_path
        );

        let process = kernelspec
            .command(&connection_file_path, Some(Stdio::null()), Some(Stdio::null()))?
            .kill_on_drop(true)
            .spawn()?;

        // Small delay to let the kernel bind its sockets
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut kernel = Self::connect(connection_info).await?;
        kernel.connection_file = Some(connection_file_path);
        kernel.process = StdMutex::new(Some(process));
        info!("[kernel] Kernel started: {}", kernel_id);
        Ok(kernel)
    }

    /// Attach to an already running kernel described by a connection file.
    pub async fn from_connection_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let connection_info: ConnectionInfo = serde_json::from_str(&contents)?;
        info!("[kernel] Attaching to kernel from {:?}", path);
        Self::connect(connection_info).await
    }

    async fn connect(connection_info: ConnectionInfo) -> Result<Self> {
        let session_id = Uuid::new_v4().to_string();
        let identity = runtimelib::peer_identity_for_session(&session_id)?;
        let mut shell = runtimelib::create_client_shell_connection_with_identity(
            &connection_info,
            &session_id,
            identity,
        )
        .await?;

        // Verify kernel is alive with kernel_info handshake
        let request: JupyterMessage = KernelInfoRequest::default().into();
        shell.send(request).await?;

        match tokio::time::timeout(Duration::from_secs(30), shell.read()).await {
            Ok(Ok(msg)) => {
                info!("[kernel] Kernel alive: got {} reply", msg.header.msg_type);
            }
            Ok(Err(e)) => {
                error!("[kernel] Error reading kernel_info_reply: {}", e);
                return Err(anyhow::anyhow!("Kernel did not respond: {}", e));
            }
            Err(_) => {
                error!("[kernel] Timeout waiting for kernel_info_reply");
                return Err(anyhow::anyhow!("Kernel did not respond within 30s"));
            }
        }

        let (shell_writer, mut shell_reader) = shell.split();

        let router = Arc::new(ReplyRouter::new());
        let reader_router = router.clone();
        let shell_reader_task = tokio::spawn(async move {
            loop {
                match shell_reader.read().await {
                    Ok(msg) => {
                        let parent_msg_id = msg.parent_header.as_ref().map(|h| h.msg_id.clone());

                        match msg.content {
                            JupyterMessageContent::InspectReply(reply) => {
                                let routed = parent_msg_id
                                    .is_some_and(|id| reader_router.route(&id, reply));
                                if !routed {
                                    debug!("[kernel] inspect_reply with no pending request");
                                }
                            }
                            _ => {
                                debug!("[kernel] shell reply: type={}", msg.header.msg_type);
                            }
                        }
                    }
                    Err(e) => {
                        error!("[kernel] shell read error: {}", e);
                        break;
                    }
                }
            }
            reader_router.close();
        });

        Ok(Self {
            connection_info,
            connection_file: None,
            session_id,
            shell_writer: Arc::new(AsyncMutex::new(shell_writer)),
            shell_reader_task,
            router,
            process: StdMutex::new(None),
        })
    }

    pub fn kernel_name(&self) -> Option<&str> {
        self.connection_info.kernel_name.as_deref()
    }

    /// Number of inspect requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.router.len()
    }

    /// Whether replies can still reach this process.
    pub fn is_connected(&self) -> bool {
        !self.router.is_closed()
    }

    /// Stop routing replies and, if this process launched the kernel, shut it down.
    pub async fn shutdown(&self) -> Result<()> {
        self.shell_reader_task.abort();
        self.router.close();

        let process = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut process) = process {
            let mut control = runtimelib::create_client_control_connection(
                &self.connection_info,
                &self.session_id,
            )
            .await?;
            let request: JupyterMessage = ShutdownRequest { restart: false }.into();
            control.send(request).await.ok();
            // Killed on drop if it does not exit in time
            if tokio::time::timeout(Duration::from_secs(3), process.wait())
                .await
                .is_err()
            {
                info!("[kernel] Kernel did not exit after shutdown_request, killing");
            }
        }

        if let Some(ref path) = self.connection_file {
            tokio::fs::remove_file(path).await.ok();
        }

        Ok(())
    }
}

impl KernelChannel for RuntimeKernel {
    fn inspect(
        &self,
        request: InspectRequest,
    ) -> BoxFuture<'static, Result<InspectReply, ConnectorError>> {
        let writer = self.shell_writer.clone();
        let router = self.router.clone();

        async move {
            let message: JupyterMessage = request.into();
            let msg_id = message.header.msg_id.clone();

            // Register before sending so the reader task can route the reply
            let rx = router.register(&msg_id)?;

            if let Err(e) = writer.lock().await.send(message).await {
                router.forget(&msg_id);
                return Err(ConnectorError::Transport(e.to_string()));
            }
            debug!("[kernel] Sent inspect_request: msg_id={}", msg_id);

            rx.await.map_err(|_| ConnectorError::Cancelled)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jupyter_protocol::{Media, MediaType, ReplyStatus};

    fn reply(text: &str) -> InspectReply {
        InspectReply {
            found: true,
            data: Media {
                content: vec![MediaType::Plain(text.to_string())],
            },
            metadata: Default::default(),
            status: ReplyStatus::Ok,
            error: None,
        }
    }

    fn text(reply: InspectReply) -> Option<String> {
        reply.data.content.into_iter().find_map(|media| match media {
            MediaType::Plain(text) => Some(text),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_router_delivers_by_parent_msg_id() {
        let router = ReplyRouter::new();
        let first = router.register("msg-1").unwrap();
        let second = router.register("msg-2").unwrap();
        assert_eq!(router.len(), 2);

        assert!(router.route("msg-2", reply("two")));
        assert!(router.route("msg-1", reply("one")));
        assert!(!router.route("msg-3", reply("nobody")));

        assert_eq!(text(first.await.unwrap()).as_deref(), Some("one"));
        assert_eq!(text(second.await.unwrap()).as_deref(), Some("two"));
        assert_eq!(router.len(), 0);
    }

    #[tokio::test]
    async fn test_closing_router_cancels_waiting_requests() {
        let router = ReplyRouter::new();
        let waiting = router.register("msg-1").unwrap();

        router.close();

        assert!(waiting.await.is_err());
        assert!(router.is_closed());
        assert_eq!(router.len(), 0);
    }

    #[test]
    fn test_closed_router_refuses_new_requests() {
        let router = ReplyRouter::new();
        router.close();

        assert_eq!(router.register("msg-1").unwrap_err(), ConnectorError::Cancelled);
        assert_eq!(router.len(), 0);
        assert!(!router.route("msg-1", reply("late")));
        // Closing twice is harmless
        router.close();
    }

    #[test]
    fn test_forget_drops_registration() {
        let router = ReplyRouter::new();
        let _rx = router.register("msg-1").unwrap();
        router.forget("msg-1");
        assert_eq!(router.len(), 0);
        assert!(!router.route("msg-1", reply("late")));
    }
}
