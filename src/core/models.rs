use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/*
 * Represents the explicit check state of a tracked directory.
 * This is the stored, user/persistence-controlled flag for one directory,
 * independent of its ancestors. Whether a directory is *effectively* selected
 * is a derived property computed by the SelectionStore from the whole
 * ancestor chain.
 *
 * Serialized into the project config as lowercase strings ("checked" /
 * "unchecked") to stay compatible with configs written by earlier versions.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Checked,
    Unchecked,
}

impl CheckState {
    pub fn toggled(self) -> Self {
        match self {
            CheckState::Checked => CheckState::Unchecked,
            CheckState::Unchecked => CheckState::Checked,
        }
    }
}

/*
 * The kind of a single snapshot entry produced by a scan.
 * `Directory` is the normal case. `ReadError` marks a directory whose
 * contents could not be listed (the scan continues around it), and
 * `AbortMarker` is the single synthetic entry appended when the user declines
 * to continue a scan that exceeded its time budget.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    ReadError,
    AbortMarker,
}

/*
 * One entry of a TreeSnapshot. Entries carry parent linkage by path (paths
 * are the only node identity in this system), a display label, and a kind.
 * The label for directories includes a human-readable aggregate size; the
 * root entry is additionally tagged "(Project Root)".
 */
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub parent: Option<PathBuf>,
    pub path: PathBuf,
    pub label: String,
    pub kind: EntryKind,
}

/*
 * An ephemeral, ordered representation of the directories discovered during
 * one scan, in depth-first emission order. It is produced by the scan worker,
 * consumed exactly once by the coordinator to derive its display tree shape
 * and seed the SelectionStore, and then discarded. It is never the system's
 * persistent state.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeSnapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl TreeSnapshot {
    pub fn push(&mut self, entry: SnapshotEntry) {
        self.entries.push(entry);
    }

    pub fn directory_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == EntryKind::Directory)
            .count()
    }
}

/*
 * One item produced by the SelectiveCollector. The collector emits
 * directories and files in depth-first order (directories before files at
 * each level, case-insensitive name order). `selected` records effective
 * selection: unselected directories are emitted (so the tree export can show
 * them) but never descended into, and files only ever appear under selected
 * directories. `is_binary` is a classification hint for files; consumers
 * decide what to do with binaries.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedItem {
    pub relative_path: PathBuf,
    pub is_dir: bool,
    pub is_binary: bool,
    pub selected: bool,
}

impl CollectedItem {
    pub fn is_included_file(&self) -> bool {
        !self.is_dir && self.selected
    }
}

/*
 * Formats a byte count the way the scan labels and log lines display sizes:
 * "(0 B)", "(512 B)", "(1.5 KB)", "(2.3 MB)", "(1.25 GB)".
 */
pub fn format_display_size(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        return format!("({size_bytes} B)");
    }
    let size_kb = size_bytes as f64 / 1024.0;
    if size_kb < 1024.0 {
        return format!("({size_kb:.1} KB)");
    }
    let size_mb = size_kb / 1024.0;
    if size_mb < 1024.0 {
        return format!("({size_mb:.1} MB)");
    }
    format!("({:.2} GB)", size_mb / 1024.0)
}
