/*
 * Gzip-compressed tar backup of the selected file set. Archives exactly the
 * collector's included files under their root-relative names; selection and
 * exclusion logic never re-runs here. A run that adds no files deletes the
 * empty archive instead of leaving it behind.
 */
use super::models::CollectedItem;
use super::project::{LOG_SUBDIR_BACKUP, ProjectContext, timestamped_name};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

/*
 * Writes `<rootname>_backup_<timestamp>.tar.gz` under the backup output
 * directory. A file that disappears or becomes unreadable between collection
 * and archiving is logged and skipped; only creating or finishing the
 * archive itself can fail the run.
 *
 * Returns the archive path, or None when no file made it in.
 */
pub fn export_backup(
    ctx: &ProjectContext,
    items: &[CollectedItem],
) -> io::Result<Option<PathBuf>> {
    let output_dir = ctx.ensure_output_dir(LOG_SUBDIR_BACKUP)?;
    let stem = format!("{}_backup", ctx.display_name());
    let archive_path = output_dir.join(timestamped_name(&stem, ".tar.gz"));

    let archive_file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(archive_file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut files_added = 0usize;
    for item in items.iter().filter(|i| i.is_included_file()) {
        let absolute = ctx.root_path().join(&item.relative_path);
        match builder.append_path_with_name(&absolute, &item.relative_path) {
            Ok(()) => files_added += 1,
            Err(e) => {
                log::warn!("Backup: Could not add {absolute:?} to archive: {e}");
            }
        }
    }
    builder.into_inner()?.finish()?;

    if files_added == 0 {
        log::info!("Backup: No files were selected; removing empty archive.");
        if let Err(e) = fs::remove_file(&archive_path) {
            log::warn!("Backup: Could not remove empty archive {archive_path:?}: {e}");
        }
        return Ok(None);
    }

    log::info!("Backup: {files_added} files archived to {archive_path:?}.");
    Ok(Some(archive_path))
}
