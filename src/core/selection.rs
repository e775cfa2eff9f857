/*
 * The SelectionStore owns the explicit check state of every scanned
 * directory, keyed by absolute path. It is the sole source of truth for
 * persistence and is mutated only on the coordinator thread; scan workers
 * hand back seed values for the coordinator to apply.
 *
 * Effective selection is a *containment* property, not an independent
 * per-node flag: a path counts as selected only when it and every directory
 * between it and the project root are explicitly Checked. Unchecking a folder
 * therefore excludes its entire subtree without rewriting any descendant's
 * stored state, and re-checking it restores whatever the descendants said
 * before.
 */
use super::models::CheckState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    states: HashMap<PathBuf, CheckState>,
}

impl SelectionStore {
    pub fn new() -> Self {
        SelectionStore {
            states: HashMap::new(),
        }
    }

    /// Overwrites a path's explicit state. Idempotent.
    pub fn set_explicit(&mut self, path: PathBuf, state: CheckState) {
        self.states.insert(path, state);
    }

    pub fn explicit_state(&self, path: &Path) -> Option<CheckState> {
        self.states.get(path).copied()
    }

    /*
     * Flips a tracked path between Checked and Unchecked. Toggling a path
     * with no explicit state indicates the node is not scan-tracked (an
     * error placeholder, or a stale path from a previous root); that is
     * logged and ignored rather than silently creating state.
     */
    pub fn toggle(&mut self, path: &Path) -> bool {
        match self.states.get_mut(path) {
            Some(state) => {
                *state = state.toggled();
                log::debug!("SelectionStore: Toggled {path:?} to {state:?}.");
                true
            }
            None => {
                log::warn!(
                    "SelectionStore: Toggle requested for untracked path {path:?}; ignoring."
                );
                false
            }
        }
    }

    /*
     * Returns true iff `path` lies at or under `root` and every directory on
     * the chain from `root` down to `path` inclusive is explicitly Checked.
     * A missing state for a non-root directory on the chain is treated as
     * Unchecked (fail closed); a missing state for the root itself defaults
     * to Checked. A single Unchecked ancestor short-circuits the whole
     * subtree; there is no override by a deeper directory.
     *
     * Intended for directory paths: file paths are judged by their parent
     * directory at the call sites.
     */
    pub fn is_effectively_selected(&self, path: &Path, root: &Path) -> bool {
        if path != root && path.strip_prefix(root).is_err() {
            return false;
        }

        let mut current = path;
        loop {
            match self.states.get(current) {
                Some(CheckState::Unchecked) => return false,
                Some(CheckState::Checked) => {}
                None if current != root => return false,
                None => {}
            }
            if current == root {
                // The root's own default, if absent, is Checked.
                return self
                    .states
                    .get(root)
                    .copied()
                    .unwrap_or(CheckState::Checked)
                    == CheckState::Checked;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Replaces all tracked states, used when a scan completes.
    pub fn replace_all<I>(&mut self, states: I)
    where
        I: IntoIterator<Item = (PathBuf, CheckState)>,
    {
        self.states = states.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &CheckState)> {
        self.states.iter()
    }
}
