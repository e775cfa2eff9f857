/*
 * Tri-state display classification. The SelectionStore holds two-valued
 * explicit states; the display layer needs three: a checked directory whose
 * children are not uniformly checked renders differently from one whose
 * subtree is fully on, and differently again from an explicitly (or
 * inherited) unchecked one.
 *
 * Projection is a pure function of the store and the tree shape, recomputed
 * wholesale after every toggle and every completed scan. Directory counts in
 * practice are small enough that a full pass is cheaper than maintaining an
 * incremental structure.
 */
use super::models::{CheckState, EntryKind, TreeSnapshot};
use super::selection::SelectionStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    FullyChecked,
    FullyUnchecked,
    Mixed,
}

/*
 * Computes the projection of every directory in the snapshot in one
 * root-down pass. Rules:
 * - An explicitly Unchecked directory, a directory with no stored state, or
 *   any directory below an unchecked one projects as FullyUnchecked.
 * - A checked directory with no tracked children projects as FullyChecked.
 * - A checked directory whose direct children are all Checked projects as
 *   FullyChecked; any other mix of child states projects as Mixed. An
 *   all-unchecked set of children is Mixed, not FullyUnchecked: the
 *   directory itself is still on, which is visibly different from being
 *   explicitly off.
 * The root with no stored state defaults to Checked.
 */
pub fn project_all(
    snapshot: &TreeSnapshot,
    store: &SelectionStore,
    root: &Path,
) -> HashMap<PathBuf, Projection> {
    let mut children: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for entry in &snapshot.entries {
        if entry.kind != EntryKind::Directory {
            continue;
        }
        if let Some(parent) = &entry.parent {
            children
                .entry(parent.as_path())
                .or_default()
                .push(entry.path.as_path());
        }
    }

    let mut projections = HashMap::new();
    project_node(root, root, false, &children, store, &mut projections);
    projections
}

fn project_node(
    path: &Path,
    root: &Path,
    ancestor_unchecked: bool,
    children: &HashMap<&Path, Vec<&Path>>,
    store: &SelectionStore,
    out: &mut HashMap<PathBuf, Projection>,
) {
    let own_state = match store.explicit_state(path) {
        Some(state) => state,
        // Only the root gets a Checked default; anything else untracked is
        // off until a scan seeds it.
        None if path == root => CheckState::Checked,
        None => CheckState::Unchecked,
    };
    let unchecked_here = ancestor_unchecked || own_state == CheckState::Unchecked;

    let child_paths = children.get(path).map(Vec::as_slice).unwrap_or(&[]);
    let projection = if unchecked_here {
        Projection::FullyUnchecked
    } else if child_paths
        .iter()
        .all(|c| store.explicit_state(c) == Some(CheckState::Checked))
    {
        Projection::FullyChecked
    } else {
        Projection::Mixed
    };
    out.insert(path.to_path_buf(), projection);

    for child in child_paths {
        project_node(child, root, unchecked_here, children, store, out);
    }
}
