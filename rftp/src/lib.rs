//! `rftp` - mirror a local directory subtree onto an FTP server
//!
//! The tool takes a local root folder, a set of glob patterns and a remote
//! target directory, and uploads every matched file over a single FTP
//! session:
//!
//! ```bash
//! # Upload a site build, replacing the previous remote contents
//! rftp ./public --server ftp://ftp.example.com --user deploy \
//!     --remote-path /site --clean --overwrite --progress
//!
//! # Upload only logs, keeping whatever already exists remotely
//! rftp /var/export -p '*.log' --server ftp://backup.example.com \
//!     --user backup --remote-path /archive
//! ```
//!
//! # Behavior
//!
//! - Patterns are matched against the full recursive listing of the root
//!   folder; matched files pull their containing directories in with them
//!   so the remote tree can be built before files land in it.
//! - `--flatten` places every file directly under the remote path,
//!   discarding the local directory structure.
//! - `--clean` removes the entire remote target directory first.
//! - Without `--overwrite`, files that already exist remotely are skipped
//!   (one directory listing per candidate file).
//! - The whole task is a single best-effort pass: the first unrecoverable
//!   error fails the task immediately, with no retries and no
//!   partial-success reporting.
//!
//! # Architecture
//!
//! One item per matched entry is spawned onto the runtime; every remote
//! operation goes through the single shared session. Completion events are
//! aggregated by one loop which owns all progress counters, so the
//! counters need no locking. A file upload waits for the creation of its
//! containing remote directory before storing, which makes the
//! directory-before-file ordering explicit rather than a property of
//! scheduling luck.

pub mod config;
pub mod matcher;
pub mod path;
pub mod session;
pub mod transport;
pub mod upload;
