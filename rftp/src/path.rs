//! Maps matched local entries to their remote destinations.
//!
//! Remote paths are plain `/`-separated strings regardless of the local
//! platform separator. The mapping is a pure function of the entry, the
//! root folder, the remote target path and the flatten flag.

use crate::matcher::{EntryKind, LocalEntry};

/// Remote destination derived 1:1 from one local entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub path: String,
    pub kind: EntryKind,
}

/// Joins a relative component onto a base remote path.
pub fn join_remote(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = rel.trim_start_matches('/');
    if rel.is_empty() {
        if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        }
    } else if base.is_empty() {
        format!("/{rel}")
    } else {
        format!("{base}/{rel}")
    }
}

/// Base name of a remote path.
pub fn remote_basename(path: &str) -> &str {
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

/// Containing directory of a remote path ("/" when there is none).
pub fn remote_parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Renders a relative local path with `/` separators.
fn slash_components(path: &std::path::Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

fn base_name(entry: &LocalEntry) -> String {
    entry
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Derives the remote destination for one matched entry.
///
/// With `flatten` every file lands directly under `remote_path` and
/// directories keep a nominal target that is never created remotely.
/// Otherwise the local path relative to the root folder is preserved.
/// When the root folder is itself the uploaded file, the file maps to
/// `remote_path/basename` and its containing directory to `remote_path`.
pub fn map_entry(
    entry: &LocalEntry,
    root: &std::path::Path,
    remote_path: &str,
    flatten: bool,
) -> RemoteTarget {
    let path = if entry.kind == EntryKind::File && (flatten || entry.path == root) {
        join_remote(remote_path, &base_name(entry))
    } else {
        match entry.path.strip_prefix(root) {
            Ok(rel) => join_remote(remote_path, &slash_components(rel)),
            // the containing directory of a single-file root sits above it
            Err(_) => join_remote(remote_path, ""),
        }
    };
    RemoteTarget {
        path,
        kind: entry.kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> LocalEntry {
        LocalEntry {
            path: std::path::PathBuf::from(path),
            kind: EntryKind::File,
        }
    }

    fn directory(path: &str) -> LocalEntry {
        LocalEntry {
            path: std::path::PathBuf::from(path),
            kind: EntryKind::Directory,
        }
    }

    #[test]
    fn tree_mode_preserves_relative_paths() {
        let root = std::path::Path::new("/data/site");
        let target = map_entry(&file("/data/site/sub/b.txt"), root, "/remote", false);
        assert_eq!(target.path, "/remote/sub/b.txt");
        assert_eq!(target.kind, EntryKind::File);
        let target = map_entry(&directory("/data/site/sub"), root, "/remote", false);
        assert_eq!(target.path, "/remote/sub");
        assert_eq!(target.kind, EntryKind::Directory);
    }

    #[test]
    fn flatten_maps_every_file_to_the_remote_root() {
        let root = std::path::Path::new("/data/site");
        for local in ["/data/site/a.txt", "/data/site/x/y/z/a.txt"] {
            let target = map_entry(&file(local), root, "/remote", true);
            assert_eq!(target.path, "/remote/a.txt");
        }
    }

    #[test]
    fn flatten_keeps_directory_kind_tags() {
        let root = std::path::Path::new("/data/site");
        let target = map_entry(&directory("/data/site/sub"), root, "/remote", true);
        assert_eq!(target.kind, EntryKind::Directory);
    }

    #[test]
    fn single_file_root_maps_beside_the_remote_path() {
        let root = std::path::Path::new("/data/report.pdf");
        let target = map_entry(&file("/data/report.pdf"), root, "/remote", false);
        assert_eq!(target.path, "/remote/report.pdf");
        let target = map_entry(&directory("/data"), root, "/remote", false);
        assert_eq!(target.path, "/remote");
    }

    #[test]
    fn join_remote_handles_slashes() {
        assert_eq!(join_remote("/remote", "a.txt"), "/remote/a.txt");
        assert_eq!(join_remote("/remote/", "/a.txt"), "/remote/a.txt");
        assert_eq!(join_remote("/", "a.txt"), "/a.txt");
        assert_eq!(join_remote("/remote", ""), "/remote");
        assert_eq!(join_remote("/", ""), "/");
    }

    #[test]
    fn remote_parent_and_basename() {
        assert_eq!(remote_parent("/remote/sub/a.txt"), "/remote/sub");
        assert_eq!(remote_parent("/a.txt"), "/");
        assert_eq!(remote_parent("relative"), "/");
        assert_eq!(remote_basename("/remote/sub/a.txt"), "a.txt");
        assert_eq!(remote_basename("a.txt"), "a.txt");
    }
}
