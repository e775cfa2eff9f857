/*
 * Filename exclusion matching. Two logically merged collections drive the
 * decision: a fixed built-in pattern set and a user-editable dynamic set that
 * is persisted per project. A pattern is either an exact filename or a
 * leading-wildcard suffix pattern ("*.ext"). Matching is filename-only and
 * case-sensitive; no path separators are ever matched, so a pattern can never
 * target a specific directory.
 *
 * The module also owns the built-in excluded-folder-name set, which is not a
 * matching concern at collection time but a seeding rule: a freshly scanned
 * directory whose name appears here defaults to Unchecked unless the project
 * config says otherwise.
 */
use std::collections::BTreeSet;

/*
 * Folder names that default to Unchecked when first discovered by a scan.
 * These are the usual dependency/build/IDE directories nobody wants in an
 * export by default. The user can still check them explicitly.
 */
pub const EXCLUDED_FOLDERS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    ".mypy_cache",
    "_logs",
    "dist",
    "build",
    ".vscode",
    ".idea",
    "target",
    "out",
    "bin",
    "obj",
    "Debug",
    "Release",
    "logs",
];

pub const PREDEFINED_EXCLUDED_FILENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    ".DS_Store",
    "Thumbs.db",
    "*.pyc",
    "*.pyo",
    "*.swp",
    "*.swo",
];

/// Outcome of a batch removal from the dynamic pattern set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemovalOutcome {
    pub removed: usize,
    pub missing: usize,
}

/*
 * Decides whether a filename is excluded by the merged pattern sets.
 * The dynamic set is mutable and sorted (BTreeSet) so that persistence and
 * the management UI always see a stable order. Mutations here do not perform
 * the config write themselves; the coordinator owns persistence and triggers
 * it after every successful mutation.
 */
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    dynamic: BTreeSet<String>,
}

impl ExclusionMatcher {
    pub fn new() -> Self {
        ExclusionMatcher {
            dynamic: BTreeSet::new(),
        }
    }

    /*
     * Checks a filename (never a path) against every built-in and dynamic
     * pattern. A "*."-prefixed pattern matches when the filename ends with
     * the pattern's suffix, so "*.pyc" excludes "foo.pyc" but not
     * "foo.pyc.bak". Any other pattern requires an exact match.
     */
    pub fn is_excluded_filename(&self, filename: &str) -> bool {
        let builtin = PREDEFINED_EXCLUDED_FILENAMES.iter().copied();
        let dynamic = self.dynamic.iter().map(String::as_str);
        for pattern in builtin.chain(dynamic) {
            if pattern.is_empty() {
                continue;
            }
            if pattern.starts_with("*.") {
                if filename.ends_with(&pattern[1..]) {
                    return true;
                }
            } else if pattern == filename {
                return true;
            }
        }
        false
    }

    /// Checks a directory name against the built-in excluded-folder set.
    pub fn is_excluded_folder_name(name: &str) -> bool {
        EXCLUDED_FOLDERS.contains(&name)
    }

    /*
     * Adds a dynamic pattern. Returns false (and logs) for empty input or a
     * pattern that is already present, so callers know whether a persistence
     * write is warranted.
     */
    pub fn add_dynamic_pattern(&mut self, pattern: &str) -> bool {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            log::warn!("ExclusionMatcher: Ignoring empty exclusion pattern.");
            return false;
        }
        if !self.dynamic.insert(trimmed.to_string()) {
            log::info!("ExclusionMatcher: Pattern '{trimmed}' is already in the dynamic list.");
            return false;
        }
        log::info!("ExclusionMatcher: Added dynamic filename exclusion '{trimmed}'.");
        true
    }

    /*
     * Removes every listed pattern in one pass and reports how many were
     * actually found versus absent. Patterns can go missing when two views of
     * the set get out of sync, so the caller needs both counts to report
     * accurately.
     */
    pub fn remove_dynamic_patterns(&mut self, patterns: &[String]) -> RemovalOutcome {
        let mut outcome = RemovalOutcome::default();
        for pattern in patterns {
            if self.dynamic.remove(pattern) {
                log::info!("ExclusionMatcher: Removed dynamic exclusion '{pattern}'.");
                outcome.removed += 1;
            } else {
                log::warn!("ExclusionMatcher: Pattern '{pattern}' not found in dynamic set.");
                outcome.missing += 1;
            }
        }
        outcome
    }

    /// Replaces the dynamic set wholesale, used when loading a project config.
    pub fn set_dynamic_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dynamic = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .collect();
    }

    pub fn dynamic_patterns(&self) -> Vec<String> {
        self.dynamic.iter().cloned().collect()
    }

    pub fn clear_dynamic_patterns(&mut self) {
        self.dynamic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_suffix_matches_only_true_suffix() {
        let matcher = ExclusionMatcher::new();
        assert!(matcher.is_excluded_filename("foo.pyc"));
        assert!(!matcher.is_excluded_filename("foo.pyc.bak"));
        assert!(!matcher.is_excluded_filename("foopyc"));
    }

    #[test]
    fn test_exact_pattern_matches_only_literal_name() {
        let matcher = ExclusionMatcher::new();
        assert!(matcher.is_excluded_filename("package-lock.json"));
        assert!(!matcher.is_excluded_filename("package-lock.json.bak"));
        assert!(!matcher.is_excluded_filename("my-package-lock.json"));
    }

    #[test]
    fn test_wildcard_matching_is_case_sensitive() {
        let matcher = ExclusionMatcher::new();
        assert!(!matcher.is_excluded_filename("foo.PYC"));
    }

    #[test]
    fn test_dynamic_patterns_participate_in_matching() {
        let mut matcher = ExclusionMatcher::new();
        assert!(!matcher.is_excluded_filename("secrets.env"));
        assert!(matcher.add_dynamic_pattern("secrets.env"));
        assert!(matcher.add_dynamic_pattern("*.log"));
        assert!(matcher.is_excluded_filename("secrets.env"));
        assert!(matcher.is_excluded_filename("build.log"));
        assert!(!matcher.is_excluded_filename("build.log.1"));
    }

    #[test]
    fn test_add_rejects_empty_and_duplicate() {
        let mut matcher = ExclusionMatcher::new();
        assert!(!matcher.add_dynamic_pattern("   "));
        assert!(matcher.add_dynamic_pattern("*.tmp"));
        assert!(!matcher.add_dynamic_pattern("*.tmp"));
        assert_eq!(matcher.dynamic_patterns(), vec!["*.tmp".to_string()]);
    }

    #[test]
    fn test_batch_removal_reports_found_and_missing() {
        let mut matcher = ExclusionMatcher::new();
        matcher.add_dynamic_pattern("*.tmp");
        matcher.add_dynamic_pattern("notes.txt");

        let outcome = matcher.remove_dynamic_patterns(&[
            "*.tmp".to_string(),
            "never-added.txt".to_string(),
            "notes.txt".to_string(),
        ]);

        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.missing, 1);
        assert!(matcher.dynamic_patterns().is_empty());
    }

    #[test]
    fn test_builtin_folder_names() {
        assert!(ExclusionMatcher::is_excluded_folder_name("node_modules"));
        assert!(ExclusionMatcher::is_excluded_folder_name(".git"));
        assert!(ExclusionMatcher::is_excluded_folder_name("_logs"));
        assert!(!ExclusionMatcher::is_excluded_folder_name("src"));
    }

    #[test]
    fn test_set_dynamic_patterns_replaces_and_filters_blank() {
        let mut matcher = ExclusionMatcher::new();
        matcher.add_dynamic_pattern("old.txt");
        matcher.set_dynamic_patterns(vec!["*.bak", "", "keep.me"]);
        assert_eq!(
            matcher.dynamic_patterns(),
            vec!["*.bak".to_string(), "keep.me".to_string()]
        );
        assert!(!matcher.is_excluded_filename("old.txt"));
    }
}
