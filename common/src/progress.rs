//! Upload progress accounting.
//!
//! Every matched item has exactly one terminal outcome. Completion events
//! funnel through a single aggregation loop in the orchestrator, so the
//! tracker has a single writer and needs no locking.

/// Terminal outcome of processing one matched item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// File stored on the remote side.
    FileUploaded {
        /// Bytes sent over the wire for this file.
        bytes: u64,
    },
    /// File already present remotely and overwrite mode is off.
    FileSkipped,
    /// Remote directory created.
    DirectoryCreated,
    /// Directory needed no remote operation (flatten mode).
    DirectorySkipped,
}

/// Aggregate counters for one upload task.
///
/// All counters are monotonic; each is incremented exactly once per item.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub directories_created: usize,
    pub directories_skipped: usize,
    pub bytes_uploaded: u64,
}

impl Summary {
    /// Number of items accounted for so far.
    pub fn items_accounted(&self) -> usize {
        self.files_uploaded + self.files_skipped + self.directories_created + self.directories_skipped
    }
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_uploaded: self.files_uploaded + other.files_uploaded,
            files_skipped: self.files_skipped + other.files_skipped,
            directories_created: self.directories_created + other.directories_created,
            directories_skipped: self.directories_skipped + other.directories_skipped,
            bytes_uploaded: self.bytes_uploaded + other.bytes_uploaded,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files uploaded: {}\n\
            files skipped: {}\n\
            directories created: {}\n\
            directories skipped: {}\n\
            bytes uploaded: {}",
            self.files_uploaded,
            self.files_skipped,
            self.directories_created,
            self.directories_skipped,
            bytesize::ByteSize(self.bytes_uploaded),
        )
    }
}

/// Tracks per-item completions against the known item total.
///
/// Owned exclusively by the orchestrator's aggregation loop; the sum of
/// the four counters never exceeds the total and equals it exactly once,
/// at the moment the task concludes.
#[derive(Debug)]
pub struct ProgressTracker {
    summary: Summary,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            summary: Summary::default(),
            total,
        }
    }

    /// Record one item's terminal outcome.
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::FileUploaded { bytes } => {
                self.summary.files_uploaded += 1;
                self.summary.bytes_uploaded += bytes;
            }
            ItemOutcome::FileSkipped => self.summary.files_skipped += 1,
            ItemOutcome::DirectoryCreated => self.summary.directories_created += 1,
            ItemOutcome::DirectorySkipped => self.summary.directories_skipped += 1,
        }
        debug_assert!(self.summary.items_accounted() <= self.total);
    }

    /// True once every item has reported a terminal outcome.
    pub fn is_complete(&self) -> bool {
        self.summary.items_accounted() == self.total
    }

    /// Items still outstanding.
    pub fn remaining(&self) -> usize {
        self.total - self.summary.items_accounted()
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }
}
