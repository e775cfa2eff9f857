/*
 * The SessionCoordinator is the single owner of mutable session state: the
 * active project, the SelectionStore, the ExclusionMatcher, the latest scan
 * snapshot, and the tri-state projections derived from it. Scan workers run
 * on their own threads and communicate exclusively through the coordinator's
 * message channel; the coordinator never blocks on a worker except through
 * bounded waits while draining that channel.
 *
 * Every mutating action (toggle, exclusion edit, scan completion) is
 * followed by a config save, so the on-disk state never lags the session by
 * more than one action.
 */
use crate::core::{
    CheckState, ConfigManagerOperations, ExclusionMatcher, Projection, ProjectContext,
    RemovalOutcome, ScanHandle, ScanMessage, ScanOutcome, ScanReport, SelectionStore,
    TimeoutDecision, TreeSnapshot, collect, export_backup, export_content_dump, export_tree_map,
    project_all, spawn_scan,
};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::time::Duration;

/// Bounded wait used while a scan is in flight, so cancellation and
/// shutdown are observed promptly.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/*
 * Collaborator that answers a scan's timeout question. The CLI front-end
 * implements this with an interactive stdin prompt; tests script it.
 */
pub trait ScanTimeoutPrompt {
    fn should_continue(&self, root: &Path, elapsed: Duration) -> TimeoutDecision;
}

pub struct SessionCoordinator {
    pub(crate) project: Option<ProjectContext>,
    pub(crate) store: SelectionStore,
    pub(crate) matcher: ExclusionMatcher,
    pub(crate) snapshot: TreeSnapshot,
    pub(crate) projections: HashMap<PathBuf, Projection>,
    pub(crate) persisted_states: HashMap<PathBuf, CheckState>,
    pub(crate) last_scan_outcome: Option<ScanOutcome>,
    pub(crate) scan_budget: Duration,
    pub(crate) scan_generation: u64,
    pub(crate) active_scan: Option<ScanHandle>,
    pub(crate) events_tx: Sender<ScanMessage>,
    events_rx: Receiver<ScanMessage>,
    config_manager: Arc<dyn ConfigManagerOperations>,
    timeout_prompt: Arc<dyn ScanTimeoutPrompt>,
}

impl SessionCoordinator {
    pub fn new(
        config_manager: Arc<dyn ConfigManagerOperations>,
        timeout_prompt: Arc<dyn ScanTimeoutPrompt>,
        scan_budget: Duration,
    ) -> Self {
        let (events_tx, events_rx) = channel();
        SessionCoordinator {
            project: None,
            store: SelectionStore::new(),
            matcher: ExclusionMatcher::new(),
            snapshot: TreeSnapshot::default(),
            projections: HashMap::new(),
            persisted_states: HashMap::new(),
            last_scan_outcome: None,
            scan_budget,
            scan_generation: 0,
            active_scan: None,
            events_tx,
            events_rx,
            config_manager,
            timeout_prompt,
        }
    }

    /*
     * Selects a project root: loads its persisted config (falling back to an
     * empty state when missing or unreadable) and starts a scan. Any scan
     * still running for a previous root is cancelled first.
     */
    pub fn open_project(&mut self, root: PathBuf) {
        let ctx = ProjectContext::new(root);
        match self.config_manager.load(&ctx) {
            Ok(loaded) => {
                self.persisted_states = loaded.folder_states;
                self.matcher.set_dynamic_patterns(loaded.dynamic_exclusions);
            }
            Err(e) => {
                log::warn!(
                    "SessionCoordinator: Could not load config for {:?}: {e}. Starting empty.",
                    ctx.root_path()
                );
                self.persisted_states = HashMap::new();
                self.matcher.clear_dynamic_patterns();
            }
        }
        self.store.clear();
        self.snapshot = TreeSnapshot::default();
        self.projections.clear();
        self.last_scan_outcome = None;
        self.project = Some(ctx);
        self.start_scan();
    }

    /*
     * Starts (or restarts) the scan of the current project. A scan already
     * in flight gets its cancel flag set and its eventual Finished message
     * is discarded by generation.
     */
    pub fn start_scan(&mut self) {
        let Some(ctx) = &self.project else {
            log::error!("SessionCoordinator: No project selected; cannot scan.");
            return;
        };
        if let Some(old) = &self.active_scan {
            log::info!(
                "SessionCoordinator: Cancelling scan generation {} before restart.",
                old.generation()
            );
            old.cancel();
        }
        self.scan_generation += 1;
        let handle = spawn_scan(
            ctx.root_path().to_path_buf(),
            self.persisted_states.clone(),
            self.scan_budget,
            self.scan_generation,
            self.events_tx.clone(),
        );
        self.active_scan = Some(handle);
    }

    pub fn is_scanning(&self) -> bool {
        self.active_scan.is_some()
    }

    /// Drains all currently queued worker messages without blocking.
    pub fn process_pending_events(&mut self) {
        loop {
            match self.events_rx.try_recv() {
                Ok(message) => self.handle_scan_message(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    /*
     * Blocks in bounded slices until the active scan's Finished message has
     * been processed. Used by front-ends that have nothing else to do while
     * a scan runs.
     */
    pub fn wait_for_scan(&mut self) {
        while self.active_scan.is_some() {
            match self.events_rx.recv_timeout(SCAN_POLL_INTERVAL) {
                Ok(message) => self.handle_scan_message(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn handle_scan_message(&mut self, message: ScanMessage) {
        match message {
            ScanMessage::TimeoutQuery {
                root,
                elapsed,
                reply,
            } => {
                let decision = self.timeout_prompt.should_continue(&root, elapsed);
                log::info!(
                    "SessionCoordinator: Timeout after {elapsed:?} for {root:?}: {decision:?}."
                );
                // A worker that already observed cancellation may have
                // dropped the receiver; nothing to do then.
                let _ = reply.send(decision);
            }
            ScanMessage::Finished { generation, report } => {
                if generation != self.scan_generation {
                    log::info!(
                        "SessionCoordinator: Discarding finished scan of stale generation \
                         {generation} (current {}).",
                        self.scan_generation
                    );
                    return;
                }
                if let Some(mut handle) = self.active_scan.take() {
                    handle.join();
                }
                self.apply_scan_report(report);
            }
        }
    }

    fn apply_scan_report(&mut self, report: ScanReport) {
        log::info!(
            "SessionCoordinator: Scan of {:?} finished: {:?} ({} directories).",
            report.root,
            report.outcome,
            report.snapshot.directory_count()
        );
        match &report.outcome {
            ScanOutcome::Completed | ScanOutcome::TimedOutAborted => {
                self.store.replace_all(report.seeds);
                self.snapshot = report.snapshot;
                self.recompute_projections();
                self.persist_config();
            }
            ScanOutcome::Cancelled => {
                // A cancelled scan's partial results are dropped; the next
                // generation's report will replace the state instead.
            }
            ScanOutcome::Failed(message) => {
                log::error!("SessionCoordinator: Scan failed: {message}");
                self.snapshot = report.snapshot;
                self.store.clear();
                self.projections.clear();
            }
        }
        self.last_scan_outcome = Some(report.outcome);
    }

    /*
     * Flips one directory's check state. Untracked paths are refused by the
     * store; nothing is recomputed or persisted in that case.
     */
    pub fn toggle_directory(&mut self, path: &Path) -> bool {
        if !self.store.toggle(path) {
            return false;
        }
        self.recompute_projections();
        self.persist_config();
        true
    }

    pub fn add_exclusion_pattern(&mut self, pattern: &str) -> bool {
        if !self.matcher.add_dynamic_pattern(pattern) {
            return false;
        }
        self.persist_config();
        true
    }

    pub fn remove_exclusion_patterns(&mut self, patterns: &[String]) -> RemovalOutcome {
        let outcome = self.matcher.remove_dynamic_patterns(patterns);
        if outcome.removed > 0 {
            self.persist_config();
        }
        outcome
    }

    pub fn projection_of(&self, path: &Path) -> Option<Projection> {
        self.projections.get(path).copied()
    }

    pub fn snapshot(&self) -> &TreeSnapshot {
        &self.snapshot
    }

    pub fn last_scan_outcome(&self) -> Option<&ScanOutcome> {
        self.last_scan_outcome.as_ref()
    }

    pub fn dynamic_exclusions(&self) -> Vec<String> {
        self.matcher.dynamic_patterns()
    }

    /// Writes the tree-map export for the current selection.
    pub fn export_tree(&self) -> io::Result<PathBuf> {
        let ctx = self.require_project()?;
        let root = ctx.root_path();
        let root_selected = self.store.is_effectively_selected(root, root);
        let items = if root_selected {
            collect(root, &self.store, &self.matcher)
        } else {
            Vec::new()
        };
        export_tree_map(ctx, &items, root_selected, &self.matcher.dynamic_patterns())
    }

    /// Writes the content dump; None when no text file content was dumped.
    pub fn export_dump(&self) -> io::Result<Option<PathBuf>> {
        let ctx = self.require_project()?;
        let items = collect(ctx.root_path(), &self.store, &self.matcher);
        export_content_dump(ctx, &items)
    }

    /// Writes the tar.gz backup; None when the selection contains no files.
    pub fn export_backup(&self) -> io::Result<Option<PathBuf>> {
        let ctx = self.require_project()?;
        let items = collect(ctx.root_path(), &self.store, &self.matcher);
        export_backup(ctx, &items)
    }

    fn require_project(&self) -> io::Result<&ProjectContext> {
        self.project
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no project selected"))
    }

    fn recompute_projections(&mut self) {
        let Some(ctx) = &self.project else {
            return;
        };
        self.projections = project_all(&self.snapshot, &self.store, ctx.root_path());
    }

    fn persist_config(&self) {
        let Some(ctx) = &self.project else {
            return;
        };
        let states: HashMap<PathBuf, CheckState> = self
            .store
            .iter()
            .map(|(path, state)| (path.clone(), *state))
            .collect();
        if let Err(e) =
            self.config_manager
                .save(ctx, &states, &self.matcher.dynamic_patterns())
        {
            log::error!(
                "SessionCoordinator: Could not save config for {:?}: {e}",
                ctx.root_path()
            );
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        let Some(mut handle) = self.active_scan.take() else {
            return;
        };
        handle.cancel();
        // The worker may be parked on an unanswered timeout query; answer
        // Abort to anything pending until its Finished message arrives,
        // otherwise the join below would never return.
        loop {
            match self.events_rx.recv() {
                Ok(ScanMessage::TimeoutQuery { reply, .. }) => {
                    let _ = reply.send(TimeoutDecision::Abort);
                }
                Ok(ScanMessage::Finished { generation, .. })
                    if generation == handle.generation() =>
                {
                    break;
                }
                Ok(ScanMessage::Finished { .. }) => {}
                Err(_) => break,
            }
        }
        handle.join();
    }
}
