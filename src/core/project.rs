/*
 * Domain object representing a mapped project root. It centralizes the
 * project-local layout (the `_logs` output tree, the per-project config
 * file, timestamped artifact names) so that callers use semantic resolvers
 * instead of hand-built paths. Filesystem topology knowledge stays inside
 * `core`; higher layers work with the opaque `ProjectContext` value.
 */
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

pub(super) const LOG_SUBDIR_ROOT: &str = "_logs";
pub(super) const PROJECT_CONFIG_FILENAME: &str = "_project_mapper_config.json";
pub const LOG_SUBDIR_TREE: &str = "_projectTREE_maps";
pub const LOG_SUBDIR_DUMP: &str = "_projectDUMP_contents";
pub const LOG_SUBDIR_BACKUP: &str = "_projectBACKUP_zips";
pub const LOG_SUBDIR_SESSION: &str = "_appSESSION_logs";

const FILE_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
const HEADER_TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/*
 * Opaque handle to a project root. Wraps the resolved root `PathBuf` and
 * exposes resolvers for the output directories and the config file, so only
 * this layer knows the internal folder layout.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    root: PathBuf,
}

impl ProjectContext {
    pub fn new(root: PathBuf) -> Self {
        ProjectContext { root }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.to_string_lossy().into_owned())
    }

    pub fn resolve_logs_dir(&self) -> PathBuf {
        self.root.join(LOG_SUBDIR_ROOT)
    }

    pub fn resolve_config_file(&self) -> PathBuf {
        self.resolve_logs_dir().join(PROJECT_CONFIG_FILENAME)
    }

    /*
     * Resolves (and creates) an output subdirectory under `_logs`, e.g. the
     * tree-map or backup directory. Creation failures bubble up; callers
     * treat them as a failed export rather than a fatal condition.
     */
    pub fn ensure_output_dir(&self, sub_dir: &str) -> io::Result<PathBuf> {
        let dir = self.resolve_logs_dir().join(sub_dir);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn ensure_logs_dir(&self) -> io::Result<PathBuf> {
        let dir = self.resolve_logs_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/*
 * Builds a timestamped artifact filename from a stem and an extension:
 * ("report", ".txt") -> "report_2023-10-27_15-30-00.txt". Callers pass the
 * extension separately so compound extensions like ".tar.gz" stay intact.
 */
pub fn timestamped_name(stem: &str, extension: &str) -> String {
    format!("{stem}_{}{extension}", file_timestamp())
}

pub fn file_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(FILE_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "unknown-time".to_string())
}

/// Timestamp used inside report headers: "2023-10-27 15:30:00".
pub fn header_timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(HEADER_TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "unknown-time".to_string())
}
