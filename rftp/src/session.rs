//! Shared handle over the task's single transport session.

use anyhow::{Context, Result};

use crate::transport::RemoteTransport;

type SharedTransport<T> = std::sync::Arc<tokio::sync::Mutex<Option<T>>>;

/// Handle to the single transport connection of one upload task.
///
/// Item tasks operate through clones of this handle; the underlying
/// connection serializes their operations. `close` and `destroy` consume
/// the connection and invalidate the handle: an operation issued
/// afterwards reports a closed session instead of touching dead state.
pub struct Session<T> {
    transport: SharedTransport<T>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
        }
    }
}

impl<T: RemoteTransport> Session<T> {
    /// Wraps an already-connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: std::sync::Arc::new(tokio::sync::Mutex::new(Some(transport))),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().context("transport session already closed")?;
        transport.list(path).await
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> Result<()> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().context("transport session already closed")?;
        transport.mkdir(path, recursive).await
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> Result<()> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().context("transport session already closed")?;
        transport.rmdir(path, recursive).await
    }

    pub async fn put(&self, local: &std::path::Path, remote: &str) -> Result<u64> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().context("transport session already closed")?;
        transport.put(local, remote).await
    }

    /// Orderly shutdown; consumes the connection. Closing an already
    /// closed session is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.transport.lock().await;
        match guard.as_mut() {
            Some(transport) => {
                let result = transport.close().await;
                *guard = None;
                result
            }
            None => Ok(()),
        }
    }

    /// Forcible teardown; consumes the connection.
    pub async fn destroy(&self) {
        let mut guard = self.transport.lock().await;
        if let Some(transport) = guard.as_mut() {
            transport.destroy();
        }
        *guard = None;
    }
}
