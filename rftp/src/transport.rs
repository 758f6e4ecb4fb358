//! Remote transport boundary and the FTP adapter.
//!
//! The orchestrator only ever sees the `RemoteTransport` capability: a
//! session-oriented client where every call yields exactly one terminal
//! outcome and no internal retrying is assumed. `FtpTransport` implements
//! it over a blocking `suppaftp` stream; each operation moves the stream
//! onto the blocking pool and back, so async workers are never blocked on
//! the wire.

use std::future::Future;

use anyhow::{Context, Result, anyhow};

use crate::config::Endpoint;

/// Session-oriented remote operations used by the upload orchestrator.
///
/// Futures are `Send` so item tasks can run on the multi-threaded
/// runtime.
pub trait RemoteTransport: Send + 'static {
    /// Connect and authenticate against the endpoint.
    fn connect(&mut self, endpoint: &Endpoint) -> impl Future<Output = Result<()>> + Send;
    /// Base names of the entries under `path`.
    fn list(&mut self, path: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
    /// Create a remote directory, with missing ancestors when `recursive`.
    fn mkdir(&mut self, path: &str, recursive: bool) -> impl Future<Output = Result<()>> + Send;
    /// Remove a remote directory, including its contents when `recursive`.
    fn rmdir(&mut self, path: &str, recursive: bool) -> impl Future<Output = Result<()>> + Send;
    /// Store a local file at the remote path, returning the bytes sent.
    fn put(
        &mut self,
        local: &std::path::Path,
        remote: &str,
    ) -> impl Future<Output = Result<u64>> + Send;
    /// Orderly goodbye.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
    /// Drop the connection without the goodbye.
    fn destroy(&mut self);
}

/// `RemoteTransport` implementation over a synchronous FTP client.
#[derive(Default)]
pub struct FtpTransport {
    stream: Option<suppaftp::FtpStream>,
}

impl FtpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one blocking FTP operation on the blocking pool, moving the
    /// stream out and back around the call.
    async fn with_stream<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut suppaftp::FtpStream) -> Result<T> + Send + 'static,
    {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| anyhow!("ftp session is not connected"))?;
        let (result, stream) = tokio::task::spawn_blocking(move || {
            let result = op(&mut stream);
            (result, stream)
        })
        .await
        .context("ftp operation task failed")?;
        self.stream = Some(stream);
        result
    }
}

/// All prefixes of a remote path, shortest first.
fn ancestor_paths(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut acc = String::new();
    let mut prefixes = Vec::new();
    for part in path.split('/').filter(|part| !part.is_empty() && *part != ".") {
        if acc.is_empty() {
            acc = if absolute {
                format!("/{part}")
            } else {
                part.to_string()
            };
        } else {
            acc = format!("{acc}/{part}");
        }
        prefixes.push(acc.clone());
    }
    if prefixes.is_empty() && absolute {
        prefixes.push("/".to_string());
    }
    prefixes
}

/// Base name of one raw listing entry (servers may answer with full
/// paths or with bare names).
fn entry_base_name(entry: &str) -> &str {
    let trimmed = entry.trim_end_matches('/');
    trimmed.rfind('/').map_or(trimmed, |idx| &trimmed[idx + 1..])
}

fn mkdir_blocking(ftp: &mut suppaftp::FtpStream, path: &str, recursive: bool) -> Result<()> {
    if !recursive {
        return ftp
            .mkdir(path)
            .with_context(|| format!("failed creating remote directory {path:?}"));
    }
    for prefix in ancestor_paths(path) {
        // an existing component is fine, only create what is missing;
        // nothing else relies on the working directory, every other
        // operation uses absolute paths
        if ftp.cwd(&prefix).is_ok() {
            continue;
        }
        ftp.mkdir(&prefix)
            .with_context(|| format!("failed creating remote directory {prefix:?}"))?;
    }
    Ok(())
}

fn remove_tree(ftp: &mut suppaftp::FtpStream, path: &str) -> Result<()> {
    let entries = ftp
        .nlst(Some(path))
        .with_context(|| format!("failed listing remote directory {path:?}"))?;
    for entry in entries {
        let name = entry_base_name(&entry);
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }
        let child = format!("{}/{name}", path.trim_end_matches('/'));
        if ftp.rm(&child).is_ok() {
            continue;
        }
        // not a plain file, descend into it
        remove_tree(ftp, &child)?;
    }
    ftp.rmdir(path)
        .with_context(|| format!("failed removing remote directory {path:?}"))
}

fn rmdir_blocking(ftp: &mut suppaftp::FtpStream, path: &str, recursive: bool) -> Result<()> {
    if recursive {
        remove_tree(ftp, path)
    } else {
        ftp.rmdir(path)
            .with_context(|| format!("failed removing remote directory {path:?}"))
    }
}

fn list_blocking(ftp: &mut suppaftp::FtpStream, path: &str) -> Result<Vec<String>> {
    let entries = ftp
        .nlst(Some(path))
        .with_context(|| format!("failed listing remote directory {path:?}"))?;
    Ok(entries
        .iter()
        .map(|entry| entry_base_name(entry).to_string())
        .collect())
}

fn put_blocking(ftp: &mut suppaftp::FtpStream, local: &std::path::Path, remote: &str) -> Result<u64> {
    let mut file = std::fs::File::open(local)
        .with_context(|| format!("failed opening {local:?} for reading"))?;
    ftp.put_file(remote, &mut file)
        .with_context(|| format!("failed storing {remote:?}"))
}

impl RemoteTransport for FtpTransport {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<()> {
        if endpoint.secure {
            return Err(anyhow!(
                "ftps endpoints are not supported by the bundled ftp transport, use an ftp:// server url"
            ));
        }
        let addr = endpoint.addr();
        let user = endpoint.user.clone();
        let password = endpoint.password.clone();
        let stream = tokio::task::spawn_blocking(move || -> Result<suppaftp::FtpStream> {
            let mut stream = suppaftp::FtpStream::connect(&addr)
                .with_context(|| format!("failed connecting to {addr}"))?;
            stream.login(&user, &password).context("ftp login failed")?;
            stream
                .transfer_type(suppaftp::types::FileType::Binary)
                .context("failed selecting binary transfer mode")?;
            Ok(stream)
        })
        .await
        .context("ftp connect task failed")??;
        tracing::debug!("connected to ftp host {}", endpoint.host);
        self.stream = Some(stream);
        Ok(())
    }

    async fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.with_stream(move |ftp| list_blocking(ftp, &path)).await
    }

    async fn mkdir(&mut self, path: &str, recursive: bool) -> Result<()> {
        let path = path.to_string();
        self.with_stream(move |ftp| mkdir_blocking(ftp, &path, recursive))
            .await
    }

    async fn rmdir(&mut self, path: &str, recursive: bool) -> Result<()> {
        let path = path.to_string();
        self.with_stream(move |ftp| rmdir_blocking(ftp, &path, recursive))
            .await
    }

    async fn put(&mut self, local: &std::path::Path, remote: &str) -> Result<u64> {
        let local = local.to_path_buf();
        let remote = remote.to_string();
        self.with_stream(move |ftp| put_blocking(ftp, &local, &remote))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || stream.quit().context("ftp quit failed"))
            .await
            .context("ftp close task failed")?
    }

    fn destroy(&mut self) {
        // dropping the stream tears the connection down without QUIT
        if self.stream.take().is_some() {
            tracing::debug!("ftp session destroyed without quit");
        }
    }
}
