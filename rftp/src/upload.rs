//! The upload orchestrator.
//!
//! One task per matched item is spawned onto the runtime; every remote
//! operation goes through the shared session. The `join_next` loop is the
//! single aggregation point: it owns the progress counters, evaluates the
//! completion predicate after every increment and emits exactly one
//! terminal outcome per invocation. The first failing operation aborts
//! everything that is still outstanding.

use common::progress::{ItemOutcome, ProgressTracker, Summary};

use crate::config::UploadConfig;
use crate::matcher::{self, EntryKind};
use crate::path::{self, RemoteTarget};
use crate::session::Session;
use crate::transport::RemoteTransport;

/// Terminal failure taxonomy for one upload task.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("the specified root folder {0:?} does not exist")]
    InvalidInput(std::path::PathBuf),
    #[error("{source:#}")]
    Pattern {
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to connect to {host}: {source:#}")]
    Connection {
        host: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("unable to clean remote directory {path:?}: {source:#}")]
    Clean {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("unable to create remote directory {path:?}: {source:#}")]
    DirectoryCreation {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("upload failed for {path:?}: {source:#}")]
    Upload {
        path: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("upload task failed: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Success report for one upload task.
#[derive(Debug)]
pub struct UploadReport {
    pub host: String,
    pub remote_path: String,
    pub summary: Summary,
}

impl std::fmt::Display for UploadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ftp upload successful\n\
            host: {}\n\
            path: {}\n\
            {}",
            self.host, self.remote_path, self.summary,
        )
    }
}

/// One matched entry with its remote destination.
#[derive(Debug)]
struct UploadItem {
    local: std::path::PathBuf,
    target: RemoteTarget,
}

/// Completion gates for remote directory creation.
///
/// Every directory item gets a gate; a file task waits on its parent's
/// gate before storing, so an upload never races the creation of the
/// directory it lands in. Parents without a gate (the remote root,
/// created up front) pass immediately.
struct DirectoryGates {
    gates: std::collections::HashMap<String, tokio::sync::watch::Sender<bool>>,
}

impl DirectoryGates {
    fn new(items: &[UploadItem], flatten: bool) -> Self {
        let mut gates = std::collections::HashMap::new();
        if !flatten {
            for item in items
                .iter()
                .filter(|item| item.target.kind == EntryKind::Directory)
            {
                let (sender, _) = tokio::sync::watch::channel(false);
                gates.insert(item.target.path.clone(), sender);
            }
        }
        Self { gates }
    }

    /// Marks a directory as created, releasing any waiting uploads.
    fn open(&self, path: &str) {
        if let Some(gate) = self.gates.get(path) {
            gate.send_replace(true);
        }
    }

    /// Waits until the given directory's creation has completed.
    async fn wait(&self, path: &str) {
        if let Some(gate) = self.gates.get(path) {
            let mut receiver = gate.subscribe();
            // the sender lives as long as the gate map itself, so this
            // only returns early during task teardown
            let _ = receiver.wait_for(|created| *created).await;
        }
    }
}

async fn process_item<T: RemoteTransport>(
    item: UploadItem,
    session: Session<T>,
    gates: std::sync::Arc<DirectoryGates>,
    overwrite: bool,
    flatten: bool,
) -> Result<ItemOutcome, UploadError> {
    match item.target.kind {
        EntryKind::Directory => {
            if flatten {
                // only the single remote root exists under flatten
                tracing::debug!("skipping remote directory {:?}", item.target.path);
                return Ok(ItemOutcome::DirectorySkipped);
            }
            tracing::debug!("creating remote directory {:?}", item.target.path);
            session.mkdir(&item.target.path, true).await.map_err(|source| {
                UploadError::DirectoryCreation {
                    path: item.target.path.clone(),
                    source,
                }
            })?;
            gates.open(&item.target.path);
            tracing::debug!("remote directory created: {:?}", item.target.path);
            Ok(ItemOutcome::DirectoryCreated)
        }
        EntryKind::File => {
            if !flatten {
                gates.wait(path::remote_parent(&item.target.path)).await;
            }
            if !overwrite {
                let parent = path::remote_parent(&item.target.path);
                let listing = session.list(parent).await.map_err(|source| UploadError::Upload {
                    path: item.target.path.clone(),
                    source,
                })?;
                let base = path::remote_basename(&item.target.path);
                if listing.iter().any(|name| name == base) {
                    tracing::debug!(
                        "skipping {:?}, remote {:?} already exists",
                        item.local,
                        item.target.path
                    );
                    return Ok(ItemOutcome::FileSkipped);
                }
            }
            tracing::debug!("uploading {:?} to {:?}", item.local, item.target.path);
            let bytes = session
                .put(&item.local, &item.target.path)
                .await
                .map_err(|source| UploadError::Upload {
                    path: item.target.path.clone(),
                    source,
                })?;
            tracing::debug!("successfully uploaded {:?}", item.target.path);
            Ok(ItemOutcome::FileUploaded { bytes })
        }
    }
}

type ItemJoinSet = tokio::task::JoinSet<Result<ItemOutcome, UploadError>>;

async fn drain_aborted(join_set: &mut ItemJoinSet) {
    join_set.abort_all();
    while join_set.join_next().await.is_some() {}
}

/// Runs one upload task over the given transport.
///
/// Exactly one terminal outcome per invocation: a success report carrying
/// the aggregate counters, or the first unrecoverable error. Fail-fast,
/// no retries, no partial-success reporting.
pub async fn run_upload<T: RemoteTransport>(
    config: &UploadConfig,
    mut transport: T,
    show_progress: bool,
) -> Result<UploadReport, UploadError> {
    // local resolution happens before any remote connection is attempted
    if tokio::fs::metadata(&config.root_folder).await.is_err() {
        return Err(UploadError::InvalidInput(config.root_folder.clone()));
    }
    let entries = matcher::resolve_entries(&config.root_folder, &config.patterns)
        .await
        .map_err(|source| UploadError::Pattern { source })?;
    let items: Vec<UploadItem> = entries
        .iter()
        .map(|entry| UploadItem {
            local: entry.path.clone(),
            target: path::map_entry(entry, &config.root_folder, &config.remote_path, config.flatten),
        })
        .collect();
    tracing::debug!("{} items to process", items.len());
    for item in &items {
        tracing::debug!("item: {:?} -> {:?}", item.local, item.target.path);
    }

    transport
        .connect(&config.endpoint)
        .await
        .map_err(|source| UploadError::Connection {
            host: config.endpoint.host.clone(),
            source,
        })?;
    let session = Session::new(transport);

    if config.clean {
        tracing::info!("cleaning remote directory {:?}", config.remote_path);
        if let Err(source) = session.rmdir(&config.remote_path, true).await {
            session.destroy().await;
            return Err(UploadError::Clean {
                path: config.remote_path.clone(),
                source,
            });
        }
    } else {
        tracing::debug!("skipping clean of {:?}", config.remote_path);
    }

    // the remote root is ensured up front and never counted; under
    // flatten it is the only directory ever created
    if let Err(source) = session.mkdir(&config.remote_path, true).await {
        let _ = session.close().await;
        return Err(UploadError::DirectoryCreation {
            path: config.remote_path.clone(),
            source,
        });
    }

    let total = items.len();
    if total == 0 {
        tracing::info!("nothing matched, nothing to upload");
        if let Err(error) = session.close().await {
            tracing::warn!("error closing ftp session: {error:#}");
        }
        return Ok(UploadReport {
            host: config.endpoint.host.clone(),
            remote_path: config.remote_path.clone(),
            summary: Summary::default(),
        });
    }

    let gates = std::sync::Arc::new(DirectoryGates::new(&items, config.flatten));
    let mut join_set = ItemJoinSet::new();
    for item in items {
        join_set.spawn(process_item(
            item,
            session.clone(),
            gates.clone(),
            config.overwrite,
            config.flatten,
        ));
    }

    let progress = if show_progress {
        indicatif::ProgressBar::new(total as u64)
    } else {
        indicatif::ProgressBar::hidden()
    };
    let mut tracker = ProgressTracker::new(total);
    // single aggregation point: completion events are handled one at a
    // time, so the tracker needs no locking
    while let Some(joined) = join_set.join_next().await {
        let result = joined.unwrap_or_else(|join_error| {
            Err(UploadError::Internal(anyhow::anyhow!(
                "item task failed: {join_error}"
            )))
        });
        match result {
            Ok(outcome) => {
                tracker.record(outcome);
                progress.inc(1);
                tracing::debug!("{} of {total} items remaining", tracker.remaining());
                if tracker.is_complete() {
                    break;
                }
            }
            Err(error) => {
                drain_aborted(&mut join_set).await;
                progress.finish_and_clear();
                let _ = session.close().await;
                return Err(error);
            }
        }
    }
    debug_assert!(tracker.is_complete());
    progress.finish_and_clear();
    if let Err(error) = session.close().await {
        tracing::warn!("error closing ftp session: {error:#}");
    }
    let summary = tracker.summary();
    tracing::info!(
        "upload finished, {} of {total} items accounted for",
        summary.items_accounted()
    );
    Ok(UploadReport {
        host: config.endpoint.host.clone(),
        remote_path: config.remote_path.clone(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;

    #[derive(Debug, Default)]
    struct MockState {
        ops: Vec<String>,
        listings: std::collections::HashMap<String, Vec<String>>,
        fail_rmdir: bool,
        fail_mkdir_of: Option<String>,
        fail_put_of: Option<String>,
        connects: usize,
        closed: bool,
        destroyed: bool,
    }

    #[derive(Clone, Default)]
    struct MockTransport {
        state: std::sync::Arc<std::sync::Mutex<MockState>>,
    }

    impl MockTransport {
        fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap()
        }
    }

    impl RemoteTransport for MockTransport {
        async fn connect(&mut self, _endpoint: &Endpoint) -> anyhow::Result<()> {
            self.state().connects += 1;
            Ok(())
        }

        async fn list(&mut self, path: &str) -> anyhow::Result<Vec<String>> {
            let mut state = self.state();
            state.ops.push(format!("list {path}"));
            Ok(state.listings.get(path).cloned().unwrap_or_default())
        }

        async fn mkdir(&mut self, path: &str, _recursive: bool) -> anyhow::Result<()> {
            let mut state = self.state();
            state.ops.push(format!("mkdir {path}"));
            if state.fail_mkdir_of.as_deref() == Some(path) {
                anyhow::bail!("550 cannot create {path}");
            }
            Ok(())
        }

        async fn rmdir(&mut self, path: &str, _recursive: bool) -> anyhow::Result<()> {
            let mut state = self.state();
            state.ops.push(format!("rmdir {path}"));
            if state.fail_rmdir {
                anyhow::bail!("550 cannot remove {path}");
            }
            Ok(())
        }

        async fn put(&mut self, local: &std::path::Path, remote: &str) -> anyhow::Result<u64> {
            let bytes = std::fs::read(local)?.len() as u64;
            let mut state = self.state();
            state.ops.push(format!("put {remote}"));
            if state.fail_put_of.as_deref() == Some(remote) {
                anyhow::bail!("552 transfer failed for {remote}");
            }
            Ok(bytes)
        }

        async fn close(&mut self) -> anyhow::Result<()> {
            self.state().closed = true;
            Ok(())
        }

        fn destroy(&mut self) {
            self.state().destroyed = true;
        }
    }

    // root
    // |- a.txt
    // |- sub
    //    |- b.txt
    fn setup_tree() -> tempfile::TempDir {
        let tmp_dir = tempfile::tempdir().unwrap();
        std::fs::write(tmp_dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::create_dir(tmp_dir.path().join("sub")).unwrap();
        std::fs::write(tmp_dir.path().join("sub/b.txt"), "bravo").unwrap();
        tmp_dir
    }

    fn test_config(root: &std::path::Path) -> UploadConfig {
        UploadConfig {
            root_folder: root.to_path_buf(),
            patterns: vec!["*".to_string()],
            remote_path: "/site".to_string(),
            clean: false,
            overwrite: true,
            flatten: false,
            endpoint: Endpoint {
                host: "ftp.example.com".to_string(),
                port: 21,
                user: "deploy".to_string(),
                password: "secret".to_string(),
                secure: false,
            },
        }
    }

    fn op_position(ops: &[String], op: &str) -> usize {
        ops.iter()
            .position(|recorded| recorded == op)
            .unwrap_or_else(|| panic!("operation {op:?} not found in {ops:?}"))
    }

    #[tokio::test]
    async fn uploads_the_matched_tree() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let report = run_upload(&test_config(tmp_dir.path()), transport.clone(), false)
            .await
            .unwrap();
        assert_eq!(report.summary.directories_created, 1);
        assert_eq!(report.summary.files_uploaded, 2);
        assert_eq!(report.summary.files_skipped, 0);
        assert_eq!(report.summary.directories_skipped, 0);
        assert_eq!(report.summary.bytes_uploaded, 10);
        assert_eq!(report.host, "ftp.example.com");
        assert_eq!(report.remote_path, "/site");
        let state = transport.state();
        assert_eq!(state.connects, 1);
        assert!(state.closed);
        assert!(!state.destroyed);
        assert!(state.ops.contains(&"mkdir /site".to_string()));
        assert!(state.ops.contains(&"put /site/a.txt".to_string()));
        // a file never lands before its directory's creation completed
        let mkdir_sub = op_position(&state.ops, "mkdir /site/sub");
        let put_b = op_position(&state.ops, "put /site/sub/b.txt");
        assert!(mkdir_sub < put_b);
    }

    #[tokio::test]
    async fn overwrite_off_skips_files_already_present_remotely() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        transport.state().listings.insert(
            "/site".to_string(),
            vec!["a.txt".to_string(), "other.bin".to_string()],
        );
        let mut config = test_config(tmp_dir.path());
        config.overwrite = false;
        let report = run_upload(&config, transport.clone(), false).await.unwrap();
        assert_eq!(report.summary.files_skipped, 1);
        assert_eq!(report.summary.files_uploaded, 1);
        let state = transport.state();
        assert!(state.ops.contains(&"list /site".to_string()));
        assert!(state.ops.contains(&"list /site/sub".to_string()));
        assert!(!state.ops.contains(&"put /site/a.txt".to_string()));
        assert!(state.ops.contains(&"put /site/sub/b.txt".to_string()));
    }

    #[tokio::test]
    async fn clean_failure_issues_no_item_operations() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        transport.state().fail_rmdir = true;
        let mut config = test_config(tmp_dir.path());
        config.clean = true;
        let error = run_upload(&config, transport.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(error, UploadError::Clean { .. }));
        let state = transport.state();
        assert!(state.destroyed);
        assert!(!state.closed);
        assert_eq!(state.ops, vec!["rmdir /site".to_string()]);
    }

    #[tokio::test]
    async fn clean_runs_before_everything_else() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let mut config = test_config(tmp_dir.path());
        config.clean = true;
        run_upload(&config, transport.clone(), false).await.unwrap();
        let state = transport.state();
        assert_eq!(state.ops[0], "rmdir /site");
        assert_eq!(state.ops[1], "mkdir /site");
    }

    #[tokio::test]
    async fn missing_root_fails_before_any_connection() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let config = test_config(&tmp_dir.path().join("no-such-folder"));
        let error = run_upload(&config, transport.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(error, UploadError::InvalidInput(_)));
        assert!(error.to_string().contains("does not exist"));
        assert_eq!(transport.state().connects, 0);
    }

    #[tokio::test]
    async fn malformed_pattern_fails_before_any_connection() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let mut config = test_config(tmp_dir.path());
        config.patterns = vec!["a{b".to_string()];
        let error = run_upload(&config, transport.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(error, UploadError::Pattern { .. }));
        assert_eq!(transport.state().connects, 0);
    }

    #[tokio::test]
    async fn flatten_places_all_files_under_the_remote_root() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let mut config = test_config(tmp_dir.path());
        config.flatten = true;
        let report = run_upload(&config, transport.clone(), false).await.unwrap();
        assert_eq!(report.summary.directories_skipped, 1);
        assert_eq!(report.summary.directories_created, 0);
        assert_eq!(report.summary.files_uploaded, 2);
        let state = transport.state();
        let mkdirs: Vec<&String> = state
            .ops
            .iter()
            .filter(|op| op.starts_with("mkdir"))
            .collect();
        assert_eq!(mkdirs, vec!["mkdir /site"]);
        assert!(state.ops.contains(&"put /site/a.txt".to_string()));
        assert!(state.ops.contains(&"put /site/b.txt".to_string()));
    }

    #[tokio::test]
    async fn upload_failure_fails_the_whole_task() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        transport.state().fail_put_of = Some("/site/sub/b.txt".to_string());
        let error = run_upload(&test_config(tmp_dir.path()), transport.clone(), false)
            .await
            .unwrap_err();
        match error {
            UploadError::Upload { path, .. } => assert_eq!(path, "/site/sub/b.txt"),
            other => panic!("expected an upload error, got {other:?}"),
        }
        let state = transport.state();
        assert!(state.closed);
        assert!(!state.destroyed);
    }

    #[tokio::test]
    async fn directory_creation_failure_aborts_waiting_uploads() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        transport.state().fail_mkdir_of = Some("/site/sub".to_string());
        let error = run_upload(&test_config(tmp_dir.path()), transport.clone(), false)
            .await
            .unwrap_err();
        match error {
            UploadError::DirectoryCreation { path, .. } => assert_eq!(path, "/site/sub"),
            other => panic!("expected a directory creation error, got {other:?}"),
        }
        let state = transport.state();
        assert!(state.closed);
        // the upload waiting on the failed directory never stored
        assert!(!state.ops.contains(&"put /site/sub/b.txt".to_string()));
    }

    #[tokio::test]
    async fn empty_match_set_succeeds_with_zero_counters() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let mut config = test_config(tmp_dir.path());
        config.patterns = vec!["*.jpeg".to_string()];
        let report = run_upload(&config, transport.clone(), false).await.unwrap();
        assert_eq!(report.summary, Summary::default());
        let state = transport.state();
        assert_eq!(state.connects, 1);
        assert!(state.closed);
        assert!(!state.ops.iter().any(|op| op.starts_with("put")));
    }

    #[tokio::test]
    async fn single_file_root_uploads_the_file_beside_the_remote_path() {
        let tmp_dir = setup_tree();
        let transport = MockTransport::default();
        let config = test_config(&tmp_dir.path().join("a.txt"));
        let report = run_upload(&config, transport.clone(), false).await.unwrap();
        assert_eq!(report.summary.directories_created, 1);
        assert_eq!(report.summary.files_uploaded, 1);
        assert!(
            transport
                .state()
                .ops
                .contains(&"put /site/a.txt".to_string())
        );
    }

    #[tokio::test]
    async fn deep_subtrees_are_created_before_their_files() {
        let tmp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp_dir.path().join("x/y")).unwrap();
        std::fs::write(tmp_dir.path().join("x/y/c.txt"), "charlie").unwrap();
        let transport = MockTransport::default();
        let report = run_upload(&test_config(tmp_dir.path()), transport.clone(), false)
            .await
            .unwrap();
        assert_eq!(report.summary.directories_created, 2);
        assert_eq!(report.summary.files_uploaded, 1);
        let state = transport.state();
        let mkdir_y = op_position(&state.ops, "mkdir /site/x/y");
        let put_c = op_position(&state.ops, "put /site/x/y/c.txt");
        assert!(mkdir_y < put_c);
    }

    #[test]
    fn report_lists_host_path_and_counters() {
        let report = UploadReport {
            host: "ftp.example.com".to_string(),
            remote_path: "/site".to_string(),
            summary: Summary {
                files_uploaded: 2,
                files_skipped: 0,
                directories_created: 1,
                directories_skipped: 0,
                bytes_uploaded: 10,
            },
        };
        let text = report.to_string();
        assert!(text.contains("ftp upload successful"));
        assert!(text.contains("host: ftp.example.com"));
        assert!(text.contains("path: /site"));
        assert!(text.contains("files uploaded: 2"));
        assert!(text.contains("directories created: 1"));
    }
}
