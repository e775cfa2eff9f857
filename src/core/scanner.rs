/*
 * The cancellable background directory scan. A scan runs on a dedicated
 * worker thread, visits directories only (selection is directory-granular;
 * files are handled later by the collector), depth-first with siblings
 * sorted case-insensitively, and reports back to the coordinator over a
 * message channel. The worker never touches coordinator-owned state.
 *
 * The cooperative timeout protocol: the worker keeps an elapsed-time clock
 * and compares it against a budget at every directory it enters. On budget
 * exhaustion it sends a TimeoutQuery carrying a single-use reply sender and
 * parks on that reply channel until the coordinator answers. "Continue"
 * resets the clock and resumes in place; "Abort" appends one synthetic
 * marker entry and ends the scan. The worker never polls and never blocks
 * on anything except that reply.
 */
use super::exclusions::ExclusionMatcher;
use super::models::{
    CheckState, EntryKind, SnapshotEntry, TreeSnapshot, format_display_size,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default wall-clock budget before the scan asks whether to continue.
pub const MAX_SCAN_BUDGET: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutDecision {
    Continue,
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed,
    TimedOutAborted,
    Cancelled,
    Failed(String),
}

/*
 * Everything a finished scan hands to the coordinator in one message: the
 * snapshot for display, and the seed states for the SelectionStore. Seeds
 * follow the seeding rule: persisted state wins, otherwise built-in excluded
 * folder names default to Unchecked, otherwise Checked.
 */
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub root: PathBuf,
    pub outcome: ScanOutcome,
    pub snapshot: TreeSnapshot,
    pub seeds: Vec<(PathBuf, CheckState)>,
}

/*
 * Messages sent by the scan worker. TimeoutQuery carries a bounded
 * single-slot reply channel; the coordinator must answer it exactly once.
 * Finished is tagged with the scan's generation so the coordinator can
 * discard results from a scan that was cancelled and restarted.
 */
pub enum ScanMessage {
    TimeoutQuery {
        root: PathBuf,
        elapsed: Duration,
        reply: SyncSender<TimeoutDecision>,
    },
    Finished {
        generation: u64,
        report: ScanReport,
    },
}

/// Handle to an in-flight scan, owned by the coordinator.
pub struct ScanHandle {
    generation: u64,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ScanHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Requests cooperative cancellation; the worker checks per directory.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

/*
 * Spawns a scan worker for `root`. `persisted_states` are the folder states
 * loaded from the project config (already resolved to absolute paths), used
 * for seeding. The worker reports through `events`; the coordinator keeps
 * the returned handle to cancel or join the scan.
 */
pub fn spawn_scan(
    root: PathBuf,
    persisted_states: HashMap<PathBuf, CheckState>,
    budget: Duration,
    generation: u64,
    events: Sender<ScanMessage>,
) -> ScanHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_for_worker = Arc::clone(&cancel);
    let join = thread::spawn(move || {
        let report = run_scan(&root, &persisted_states, budget, &cancel_for_worker, &events);
        // The coordinator may already be gone on shutdown; nothing to do then.
        let _ = events.send(ScanMessage::Finished { generation, report });
    });
    ScanHandle {
        generation,
        cancel,
        join: Some(join),
    }
}

/// Why a recursion step stopped early.
enum ScanInterrupt {
    Aborted,
    Cancelled,
}

struct ScanContext<'a> {
    root: &'a Path,
    persisted: &'a HashMap<PathBuf, CheckState>,
    budget: Duration,
    clock: Instant,
    cancel: &'a AtomicBool,
    events: &'a Sender<ScanMessage>,
    snapshot: TreeSnapshot,
    seeds: Vec<(PathBuf, CheckState)>,
}

fn run_scan(
    root: &Path,
    persisted_states: &HashMap<PathBuf, CheckState>,
    budget: Duration,
    cancel: &AtomicBool,
    events: &Sender<ScanMessage>,
) -> ScanReport {
    let resolved_root = match root.canonicalize() {
        Ok(p) if p.is_dir() => p,
        Ok(p) => {
            log::error!("DirectoryScanner: Root {p:?} is not a directory.");
            return failed_report(root, format!("Not a directory: {p:?}"));
        }
        Err(e) => {
            log::error!("DirectoryScanner: Cannot resolve root {root:?}: {e}");
            return failed_report(root, format!("Cannot resolve root {root:?}: {e}"));
        }
    };
    log::debug!("DirectoryScanner: Starting scan of {resolved_root:?} (budget {budget:?}).");

    let mut ctx = ScanContext {
        root: &resolved_root,
        persisted: persisted_states,
        budget,
        clock: Instant::now(),
        cancel,
        events,
        snapshot: TreeSnapshot::default(),
        seeds: Vec::new(),
    };

    let root_state = persisted_states
        .get(&resolved_root)
        .copied()
        .unwrap_or(CheckState::Checked);
    ctx.seeds.push((resolved_root.clone(), root_state));
    let root_size = format_display_size(directory_size_bytes(&resolved_root));
    ctx.snapshot.push(SnapshotEntry {
        parent: None,
        path: resolved_root.clone(),
        label: format!(
            "{} (Project Root) {root_size}",
            display_name(&resolved_root)
        ),
        kind: EntryKind::Directory,
    });

    let outcome = match scan_recursive(&resolved_root, &mut ctx) {
        Ok(()) => ScanOutcome::Completed,
        Err(ScanInterrupt::Aborted) => {
            log::warn!("DirectoryScanner: Scan of {resolved_root:?} aborted by user (timeout).");
            ctx.snapshot.push(SnapshotEntry {
                parent: None,
                path: resolved_root.clone(),
                label: "Scan aborted by user (timeout)".to_string(),
                kind: EntryKind::AbortMarker,
            });
            ScanOutcome::TimedOutAborted
        }
        Err(ScanInterrupt::Cancelled) => {
            log::info!("DirectoryScanner: Scan of {resolved_root:?} cancelled.");
            ScanOutcome::Cancelled
        }
    };

    log::debug!(
        "DirectoryScanner: Scan of {resolved_root:?} finished: {outcome:?}, {} directories.",
        ctx.snapshot.directory_count()
    );
    ScanReport {
        root: resolved_root.clone(),
        outcome,
        snapshot: ctx.snapshot,
        seeds: ctx.seeds,
    }
}

fn scan_recursive(dir: &Path, ctx: &mut ScanContext<'_>) -> Result<(), ScanInterrupt> {
    if ctx.cancel.load(Ordering::Relaxed) {
        return Err(ScanInterrupt::Cancelled);
    }

    if ctx.clock.elapsed() > ctx.budget {
        log::warn!(
            "DirectoryScanner: Budget of {:?} exceeded at {dir:?}; asking coordinator.",
            ctx.budget
        );
        match ask_to_continue(ctx) {
            TimeoutDecision::Continue => {
                log::info!("DirectoryScanner: Continue granted; resetting scan clock.");
                ctx.clock = Instant::now();
            }
            TimeoutDecision::Abort => return Err(ScanInterrupt::Aborted),
        }
    }

    let mut subdirs = match list_subdirectories(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("DirectoryScanner: Cannot read {dir:?}: {e}; emitting placeholder.");
            ctx.snapshot.push(SnapshotEntry {
                parent: Some(dir.to_path_buf()),
                path: dir.to_path_buf(),
                label: format!("Error reading {}", display_name(dir)),
                kind: EntryKind::ReadError,
            });
            return Ok(());
        }
    };
    subdirs.sort_by_key(|p| display_name(p).to_lowercase());

    for subdir in subdirs {
        let name = display_name(&subdir);
        let state = match ctx.persisted.get(&subdir) {
            Some(state) => *state,
            None if ExclusionMatcher::is_excluded_folder_name(&name) => CheckState::Unchecked,
            None => CheckState::Checked,
        };
        ctx.seeds.push((subdir.clone(), state));

        let size = format_display_size(directory_size_bytes(&subdir));
        ctx.snapshot.push(SnapshotEntry {
            parent: Some(dir.to_path_buf()),
            path: subdir.clone(),
            label: format!("{name} {size}"),
            kind: EntryKind::Directory,
        });

        scan_recursive(&subdir, ctx)?;
    }
    Ok(())
}

/*
 * The synchronous half of the timeout round-trip. The reply channel is a
 * bounded single-slot channel created per query; the worker blocks on it
 * and nothing else. A dropped reply (coordinator shutting down) counts as
 * Abort.
 */
fn ask_to_continue(ctx: &ScanContext<'_>) -> TimeoutDecision {
    let (reply_tx, reply_rx) = sync_channel::<TimeoutDecision>(1);
    let query = ScanMessage::TimeoutQuery {
        root: ctx.root.to_path_buf(),
        elapsed: ctx.clock.elapsed(),
        reply: reply_tx,
    };
    if ctx.events.send(query).is_err() {
        return TimeoutDecision::Abort;
    }
    reply_rx.recv().unwrap_or(TimeoutDecision::Abort)
}

fn list_subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // file_type() does not follow symlinks, so a symlinked directory is
        // treated as a leaf and never recursed into.
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }
    Ok(subdirs)
}

/*
 * Recursive aggregate size of all regular files under a directory, for the
 * display label. Inaccessible entries contribute nothing; size collection
 * must never fail a scan.
 */
fn directory_size_bytes(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut total = 0u64;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_file() {
            if let Ok(meta) = entry.metadata() {
                total += meta.len();
            }
        } else if file_type.is_dir() {
            total += directory_size_bytes(&entry.path());
        }
    }
    total
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn failed_report(root: &Path, message: String) -> ScanReport {
    let mut snapshot = TreeSnapshot::default();
    snapshot.push(SnapshotEntry {
        parent: None,
        path: root.to_path_buf(),
        label: format!("Error reading {}", display_name(root)),
        kind: EntryKind::ReadError,
    });
    ScanReport {
        root: root.to_path_buf(),
        outcome: ScanOutcome::Failed(message),
        snapshot,
        seeds: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::sync::mpsc::channel;
    use tempfile::tempdir;

    fn setup_tree(base: &Path) {
        fs::create_dir_all(base.join("src/vendor")).unwrap();
        fs::create_dir_all(base.join("docs")).unwrap();
        fs::create_dir_all(base.join("node_modules/pkg")).unwrap();
        File::create(base.join("src/main.rs")).unwrap();
        File::create(base.join("docs/guide.md")).unwrap();
    }

    /*
     * Drives a scan to completion on the current thread, answering every
     * timeout query with the scripted decisions (last decision repeats).
     */
    fn run_scripted_scan(
        root: &Path,
        persisted: HashMap<PathBuf, CheckState>,
        budget: Duration,
        decisions: &[TimeoutDecision],
    ) -> (ScanReport, usize) {
        let (tx, rx) = channel();
        let mut handle = spawn_scan(root.to_path_buf(), persisted, budget, 1, tx);
        let mut queries_seen = 0usize;
        let report = loop {
            match rx.recv().expect("scan worker hung up without finishing") {
                ScanMessage::TimeoutQuery { reply, .. } => {
                    let decision = decisions
                        .get(queries_seen)
                        .copied()
                        .unwrap_or(*decisions.last().unwrap());
                    queries_seen += 1;
                    reply.send(decision).unwrap();
                }
                ScanMessage::Finished { report, .. } => break report,
            }
        };
        handle.join();
        (report, queries_seen)
    }

    #[test]
    fn test_scan_visits_directories_sorted_case_insensitively() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Zeta")).unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        fs::create_dir(dir.path().join("Beta")).unwrap();

        let (report, _) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            MAX_SCAN_BUDGET,
            &[TimeoutDecision::Continue],
        );

        assert_eq!(report.outcome, ScanOutcome::Completed);
        let names: Vec<String> = report
            .snapshot
            .entries
            .iter()
            .skip(1) // root entry
            .map(|e| {
                e.path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn test_scan_seeds_default_checked_and_builtin_unchecked() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());
        let root = dir.path().canonicalize().unwrap();

        let (report, _) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            MAX_SCAN_BUDGET,
            &[TimeoutDecision::Continue],
        );

        let seeds: HashMap<PathBuf, CheckState> = report.seeds.into_iter().collect();
        assert_eq!(seeds.get(&root), Some(&CheckState::Checked));
        assert_eq!(seeds.get(&root.join("src")), Some(&CheckState::Checked));
        assert_eq!(
            seeds.get(&root.join("node_modules")),
            Some(&CheckState::Unchecked),
            "built-in excluded folder name must default to Unchecked"
        );
        // Children of an excluded folder are still scanned and seeded.
        assert_eq!(
            seeds.get(&root.join("node_modules/pkg")),
            Some(&CheckState::Checked)
        );
    }

    #[test]
    fn test_persisted_state_wins_over_builtin_default() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());
        let root = dir.path().canonicalize().unwrap();

        let mut persisted = HashMap::new();
        persisted.insert(root.join("node_modules"), CheckState::Checked);
        persisted.insert(root.join("src"), CheckState::Unchecked);

        let (report, _) = run_scripted_scan(
            dir.path(),
            persisted,
            MAX_SCAN_BUDGET,
            &[TimeoutDecision::Continue],
        );

        let seeds: HashMap<PathBuf, CheckState> = report.seeds.into_iter().collect();
        assert_eq!(
            seeds.get(&root.join("node_modules")),
            Some(&CheckState::Checked)
        );
        assert_eq!(seeds.get(&root.join("src")), Some(&CheckState::Unchecked));
    }

    #[test]
    fn test_zero_budget_with_continue_answers_completes_without_duplicates() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());

        // Budget of zero forces a timeout query at every directory; always
        // answering Continue must produce the same snapshot a generous
        // budget would, with no re-emitted siblings.
        let (strict_report, queries) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            Duration::ZERO,
            &[TimeoutDecision::Continue],
        );
        let (relaxed_report, _) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            MAX_SCAN_BUDGET,
            &[TimeoutDecision::Continue],
        );

        assert!(queries > 0, "zero budget must trigger timeout queries");
        assert_eq!(strict_report.outcome, ScanOutcome::Completed);
        assert_eq!(strict_report.snapshot, relaxed_report.snapshot);
    }

    #[test]
    fn test_abort_appends_single_marker_and_stops() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());

        let (report, queries) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            Duration::ZERO,
            &[TimeoutDecision::Abort],
        );

        assert_eq!(queries, 1, "abort must stop after the first query");
        assert_eq!(report.outcome, ScanOutcome::TimedOutAborted);
        let markers: Vec<&SnapshotEntry> = report
            .snapshot
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::AbortMarker)
            .collect();
        assert_eq!(markers.len(), 1);
        assert_eq!(
            report.snapshot.entries.last().unwrap().kind,
            EntryKind::AbortMarker,
            "nothing may follow the abort marker"
        );
    }

    #[test]
    fn test_continue_then_abort_keeps_entries_before_abort_point() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());

        let (report, queries) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            Duration::ZERO,
            &[TimeoutDecision::Continue, TimeoutDecision::Abort],
        );

        assert_eq!(queries, 2);
        assert_eq!(report.outcome, ScanOutcome::TimedOutAborted);
        // Root plus at least the first visited directory survive.
        assert!(report.snapshot.directory_count() >= 2);
        assert_eq!(
            report.snapshot.entries.last().unwrap().kind,
            EntryKind::AbortMarker
        );
    }

    #[test]
    fn test_cancelled_scan_reports_cancelled_outcome() {
        let dir = tempdir().unwrap();
        setup_tree(dir.path());

        let (tx, rx) = channel();
        let mut handle = spawn_scan(
            dir.path().to_path_buf(),
            HashMap::new(),
            Duration::ZERO,
            7,
            tx,
        );
        // Cancel before answering the first timeout query; the worker checks
        // the flag on its next directory.
        let report = loop {
            match rx.recv().unwrap() {
                ScanMessage::TimeoutQuery { reply, .. } => {
                    handle.cancel();
                    reply.send(TimeoutDecision::Continue).unwrap();
                }
                ScanMessage::Finished { generation, report } => {
                    assert_eq!(generation, 7);
                    break report;
                }
            }
        };
        handle.join();
        assert_eq!(report.outcome, ScanOutcome::Cancelled);
    }

    #[test]
    fn test_invalid_root_fails_with_placeholder() {
        let (tx, rx) = channel();
        let mut handle = spawn_scan(
            PathBuf::from("/this/path/does/not/exist"),
            HashMap::new(),
            MAX_SCAN_BUDGET,
            1,
            tx,
        );
        let report = match rx.recv().unwrap() {
            ScanMessage::Finished { report, .. } => report,
            ScanMessage::TimeoutQuery { .. } => panic!("no timeout expected"),
        };
        handle.join();
        assert!(matches!(report.outcome, ScanOutcome::Failed(_)));
        assert_eq!(report.snapshot.entries.len(), 1);
        assert_eq!(report.snapshot.entries[0].kind, EntryKind::ReadError);
    }

    #[test]
    fn test_labels_carry_display_sizes() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/blob.bin"), vec![0u8; 2048]).unwrap();

        let (report, _) = run_scripted_scan(
            dir.path(),
            HashMap::new(),
            MAX_SCAN_BUDGET,
            &[TimeoutDecision::Continue],
        );

        assert!(report.snapshot.entries[0].label.contains("(Project Root)"));
        let data_entry = report
            .snapshot
            .entries
            .iter()
            .find(|e| e.path.file_name().is_some_and(|n| n == "data"))
            .unwrap();
        assert_eq!(data_entry.label, "data (2.0 KB)");
    }
}
