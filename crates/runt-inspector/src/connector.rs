//! Typed `inspect_request` / `inspect_reply` exchange with the active kernel.
//!
//! The connector holds a session, not a kernel: the kernel is resolved again
//! on every fetch, so restarting or swapping the kernel behind a session is
//! transparent to the handlers using it.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::future::BoxFuture;
use jupyter_protocol::{InspectReply, InspectRequest, ReplyStatus};
use log::debug;

/// Default `detail_level` for inspect requests (1 asks for source too).
pub const DEFAULT_DETAIL_LEVEL: usize = 1;

/// Error type for inspection fetches.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectorError {
    #[error("Inspection fetch requires a kernel")]
    NotReady,

    #[error("Kernel rejected inspect_request: {0}")]
    Rejected(String),

    #[error("Kernel channel closed before inspect_reply arrived")]
    Cancelled,

    #[error("Failed to send inspect_request: {0}")]
    Transport(String),
}

/// A live kernel that can answer inspect requests.
pub trait KernelChannel: Send + Sync {
    fn inspect(
        &self,
        request: InspectRequest,
    ) -> BoxFuture<'static, Result<InspectReply, ConnectorError>>;
}

/// The owner of the current kernel for one surface.
pub trait SessionContext: Send + Sync {
    /// The kernel currently available, if any.
    fn kernel(&self) -> Option<Arc<dyn KernelChannel>>;
}

/// A session whose kernel can be swapped out (start, restart, shutdown).
#[derive(Default)]
pub struct KernelSession {
    kernel: StdMutex<Option<Arc<dyn KernelChannel>>>,
}

impl KernelSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernel(kernel: Arc<dyn KernelChannel>) -> Self {
        Self {
            kernel: StdMutex::new(Some(kernel)),
        }
    }

    pub fn set_kernel(&self, kernel: Option<Arc<dyn KernelChannel>>) {
        *self.kernel.lock().unwrap_or_else(PoisonError::into_inner) = kernel;
    }
}

impl SessionContext for KernelSession {
    fn kernel(&self) -> Option<Arc<dyn KernelChannel>> {
        self.kernel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct KernelConnector {
    session: Arc<dyn SessionContext>,
    detail_level: usize,
}

impl KernelConnector {
    pub fn new(session: Arc<dyn SessionContext>) -> Self {
        Self {
            session,
            detail_level: DEFAULT_DETAIL_LEVEL,
        }
    }

    pub fn with_detail_level(mut self, detail_level: usize) -> Self {
        self.detail_level = detail_level;
        self
    }

    /// Ask the kernel about `text` at code point `offset`.
    ///
    /// Resolves with the reply only when its status is `ok`. No retries.
    pub async fn fetch(&self, text: &str, offset: usize) -> Result<InspectReply, ConnectorError> {
        let kernel = self.session.kernel().ok_or(ConnectorError::NotReady)?;

        let request = InspectRequest {
            code: text.to_string(),
            cursor_pos: offset,
            detail_level: Some(self.detail_level),
        };
        debug!(
            "[connector] inspect_request: cursor_pos={} len={}",
            offset,
            text.len()
        );

        let reply = kernel.inspect(request).await?;
        if reply.status != ReplyStatus::Ok {
            let reason = reply
                .error
                .as_ref()
                .map(|e| format!("{}: {}", e.ename, e.evalue))
                .unwrap_or_else(|| format!("{:?}", reply.status));
            return Err(ConnectorError::Rejected(reason));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use jupyter_protocol::Media;

    struct EchoKernel {
        status: ReplyStatus,
        seen: StdMutex<Vec<(String, usize, Option<usize>)>>,
    }

    impl KernelChannel for EchoKernel {
        fn inspect(
            &self,
            request: InspectRequest,
        ) -> BoxFuture<'static, Result<InspectReply, ConnectorError>> {
            self.seen.lock().unwrap().push((
                request.code.clone(),
                request.cursor_pos,
                request.detail_level,
            ));
            let reply = InspectReply {
                found: true,
                data: Media { content: Vec::new() },
                metadata: Default::default(),
                status: self.status.clone(),
                error: None,
            };
            async move { Ok(reply) }.boxed()
        }
    }

    fn echo(status: ReplyStatus) -> Arc<EchoKernel> {
        Arc::new(EchoKernel {
            status,
            seen: StdMutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_fetch_without_kernel_is_not_ready() {
        let connector = KernelConnector::new(Arc::new(KernelSession::new()));
        let result = connector.fetch("len", 3).await;
        assert_eq!(result.unwrap_err(), ConnectorError::NotReady);
    }

    #[tokio::test]
    async fn test_fetch_sends_code_offset_and_detail_level() {
        let kernel = echo(ReplyStatus::Ok);
        let session = Arc::new(KernelSession::with_kernel(kernel.clone()));
        let connector = KernelConnector::new(session).with_detail_level(0);

        let reply = connector.fetch("print(", 6).await.unwrap();

        assert!(reply.found);
        assert_eq!(
            *kernel.seen.lock().unwrap(),
            vec![("print(".to_string(), 6, Some(0))]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_rejected() {
        let session = Arc::new(KernelSession::with_kernel(echo(ReplyStatus::Error)));
        let connector = KernelConnector::new(session);

        let result = connector.fetch("x", 1).await;
        assert!(matches!(result, Err(ConnectorError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_kernel_is_resolved_on_every_fetch() {
        let session = Arc::new(KernelSession::new());
        let connector = KernelConnector::new(session.clone());
        assert_eq!(
            connector.fetch("x", 0).await.unwrap_err(),
            ConnectorError::NotReady
        );

        // Kernel comes up after the connector was built
        let kernel = echo(ReplyStatus::Ok);
        session.set_kernel(Some(kernel.clone()));
        assert!(connector.fetch("x", 0).await.is_ok());

        session.set_kernel(None);
        assert_eq!(
            connector.fetch("x", 0).await.unwrap_err(),
            ConnectorError::NotReady
        );
        assert_eq!(kernel.seen.lock().unwrap().len(), 1);
    }
}
