//! Upload task configuration and endpoint resolution.

use anyhow::{Context, Result, bail};

/// FTP server endpoint, resolved from the server URL and credentials.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// True when the server URL used the encrypted scheme.
    pub secure: bool,
}

impl Endpoint {
    /// Socket address string for the control connection.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Fully-resolved inputs for one upload task. Immutable once built.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Local folder (or single file) to upload. Absolute.
    pub root_folder: std::path::PathBuf,
    /// Ordered glob patterns selecting what to upload. Never empty.
    pub patterns: Vec<String>,
    /// Remote directory the subtree is mirrored into.
    pub remote_path: String,
    /// Remove the entire remote target directory before uploading.
    pub clean: bool,
    /// Overwrite files that already exist remotely.
    pub overwrite: bool,
    /// Discard local directory structure, upload files under the root.
    pub flatten: bool,
    pub endpoint: Endpoint,
}

/// Splits a server URL into host, port and the secure flag.
///
/// The encrypted variant is selected by the `ftps` scheme; the port
/// defaults to 21.
pub fn parse_server_url(url: &str) -> Result<(String, u16, bool)> {
    let (rest, secure) = if let Some(rest) = url.strip_prefix("ftps://") {
        (rest, true)
    } else if let Some(rest) = url.strip_prefix("ftp://") {
        (rest, false)
    } else {
        bail!("unsupported server url {url:?}, expected an ftp:// or ftps:// scheme");
    };
    let authority = rest.split('/').next().unwrap_or("");
    if authority.is_empty() {
        bail!("server url {url:?} is missing a host");
    }
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.parse::<u16>()
                .with_context(|| format!("invalid port in server url {url:?}"))?,
        ),
        None => (authority.to_string(), 21),
    };
    Ok((host, port, secure))
}

/// Makes a relative root folder absolute against the repo root.
pub fn make_absolute(path: &std::path::Path, repo_root: &std::path::Path) -> std::path::PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let resolved = repo_root.join(path);
        tracing::debug!("relative root folder {path:?} resolved to {resolved:?}");
        resolved
    }
}

/// Normalizes the remote target path: no trailing slash, never empty.
pub fn normalize_remote_path(remote_path: &str) -> String {
    let trimmed = remote_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
