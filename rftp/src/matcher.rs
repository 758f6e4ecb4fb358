//! Resolves glob patterns against the local tree into the ordered,
//! deduplicated set of entries to upload.
//!
//! # Pattern semantics
//!
//! - `*` on its own short-circuits: every entry under the root is
//!   selected, all other patterns are ignored.
//! - A pattern containing `/` is joined onto the root folder and must
//!   match the full path (`sub/*.txt` matches only directly under `sub`).
//! - A pattern without `/` also matches entry base names at any depth
//!   (`*.log` finds logs in nested directories).
//! - `**` crosses directory boundaries, `*` and `?` do not.
//! - Matching is case-insensitive on platforms with case-insensitive
//!   filesystems.
//!
//! Every matched file pulls its containing directory into the set, so
//! directory creation can precede file placement on the remote side. The
//! set is keyed by path: insertion is idempotent and the resulting order
//! is stable across runs.

use anyhow::{Context, Result};
use async_recursion::async_recursion;

/// Kind tag for a local entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One local filesystem entry selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub path: std::path::PathBuf,
    pub kind: EntryKind,
}

/// Sorted, deduplicated entry set keyed by normalized absolute path.
type EntrySet = std::collections::BTreeMap<std::path::PathBuf, EntryKind>;

/// A compiled upload pattern: the full root-joined glob plus, for simple
/// patterns (no `/`), a base-name glob matched at any depth.
struct UploadPattern {
    original: String,
    full: globset::GlobMatcher,
    base: Option<globset::GlobMatcher>,
}

impl UploadPattern {
    fn compile(root: &std::path::Path, pattern: &str) -> Result<Self> {
        let case_insensitive = cfg!(windows);
        let joined = root.join(pattern);
        let full = globset::GlobBuilder::new(&joined.to_string_lossy())
            .literal_separator(true)
            .case_insensitive(case_insensitive)
            .build()
            .with_context(|| format!("invalid glob pattern: {pattern}"))?
            .compile_matcher();
        let base = if pattern.contains('/') {
            None
        } else {
            Some(
                globset::GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .case_insensitive(case_insensitive)
                    .build()
                    .with_context(|| format!("invalid glob pattern: {pattern}"))?
                    .compile_matcher(),
            )
        };
        Ok(Self {
            original: pattern.to_string(),
            full,
            base,
        })
    }

    fn matches(&self, path: &std::path::Path) -> bool {
        if self.full.is_match(path) {
            return true;
        }
        if let Some(base) = &self.base {
            if let Some(name) = path.file_name() {
                return base.is_match(std::path::Path::new(name));
            }
        }
        false
    }
}

/// Collects every entry strictly under `dir` into the universe.
#[async_recursion]
async fn find_entries(dir: &std::path::Path, universe: &mut EntrySet) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot open directory {dir:?} for reading"))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {dir:?}"))?
    {
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("failed reading metadata from {entry_path:?}"))?;
        if file_type.is_dir() {
            universe.insert(entry_path.clone(), EntryKind::Directory);
            find_entries(&entry_path, universe).await?;
        } else {
            universe.insert(entry_path, EntryKind::File);
        }
    }
    Ok(())
}

fn into_entries(set: EntrySet) -> Vec<LocalEntry> {
    set.into_iter()
        .map(|(path, kind)| LocalEntry { path, kind })
        .collect()
}

/// Resolves the configured patterns into the sorted, deduplicated set of
/// entries to upload.
///
/// If the root is itself a file, the result is exactly the file plus its
/// containing directory and all patterns are ignored. An empty result is
/// valid and means there is nothing to upload.
pub async fn resolve_entries(
    root: &std::path::Path,
    patterns: &[String],
) -> Result<Vec<LocalEntry>> {
    let root_metadata = tokio::fs::metadata(root)
        .await
        .with_context(|| format!("failed reading metadata from {root:?}"))?;
    if root_metadata.is_file() {
        tracing::debug!("{root:?} is a file, ignoring all patterns");
        let parent = root
            .parent()
            .unwrap_or_else(|| std::path::Path::new("/"))
            .to_path_buf();
        return Ok(vec![
            LocalEntry {
                path: parent,
                kind: EntryKind::Directory,
            },
            LocalEntry {
                path: root.to_path_buf(),
                kind: EntryKind::File,
            },
        ]);
    }
    let mut universe = EntrySet::new();
    find_entries(root, &mut universe).await?;
    tracing::debug!("found {} candidate entries under {root:?}", universe.len());
    if patterns.iter().any(|pattern| pattern == "*") {
        tracing::debug!("pattern * matches everything, ignoring other patterns");
        return Ok(into_entries(universe));
    }
    let compiled = patterns
        .iter()
        .map(|pattern| UploadPattern::compile(root, pattern))
        .collect::<Result<Vec<_>>>()?;
    let mut matched = EntrySet::new();
    for pattern in &compiled {
        let mut count = 0usize;
        for (path, kind) in &universe {
            if !pattern.matches(path) {
                continue;
            }
            count += 1;
            if matched.insert(path.clone(), *kind).is_some() {
                // already selected by an earlier pattern
                continue;
            }
            tracing::debug!("adding {kind:?}: {path:?}");
            if *kind == EntryKind::File {
                if let Some(parent) = path.parent() {
                    // the remote root is ensured separately, only parents
                    // below the root become items of their own
                    if parent != root
                        && matched
                            .insert(parent.to_path_buf(), EntryKind::Directory)
                            .is_none()
                    {
                        tracing::debug!("adding parent directory: {parent:?}");
                    }
                }
            }
        }
        tracing::debug!("pattern {:?} matched {count} entries", pattern.original);
    }
    Ok(into_entries(matched))
}
