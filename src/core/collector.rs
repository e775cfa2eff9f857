/*
 * The SelectiveCollector walks the live filesystem (never the scan snapshot,
 * which may be stale) and produces the one ordered item stream that all
 * three exporters consume. The traversal rules live here and nowhere else:
 * an unselected directory is emitted but not descended into, files appear
 * only under effectively selected directories, and excluded filenames are
 * dropped before any consumer sees them.
 */
use super::exclusions::ExclusionMatcher;
use super::models::CollectedItem;
use super::selection::SelectionStore;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use walkdir::WalkDir;

/*
 * Compound suffixes that classify a file as binary without reading it.
 * Matched against the full lowercased suffix chain, so "release.tar.gz"
 * matches ".tar.gz" and a null-byte sniff is never attempted on it.
 */
const FORCE_BINARY_EXTENSIONS: &[&str] = &[
    // Archives
    ".tar.gz", ".gz", ".zip", ".rar", ".7z", ".bz2", ".xz", ".tgz",
    // Images
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".webp", ".tif", ".tiff",
    // Audio
    ".mp3", ".wav", ".ogg", ".flac", ".aac", ".m4a",
    // Video
    ".mp4", ".mkv", ".avi", ".mov", ".webm", ".flv", ".wmv",
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp",
    // Executables and libraries
    ".exe", ".dll", ".so", ".o", ".a", ".lib", ".app", ".dmg", ".deb", ".rpm",
    // Databases and data files
    ".db", ".sqlite", ".mdb", ".accdb", ".dat", ".idx", ".pickle", ".joblib",
    // Compiled code
    ".pyc", ".pyo", ".class", ".jar", ".wasm",
    // Fonts
    ".ttf", ".otf", ".woff", ".woff2",
    // Other common binary formats
    ".iso", ".img", ".bin", ".bak", ".data", ".asset", ".pak",
];

const BINARY_SNIFF_BYTES: usize = 1024;

/*
 * Walks `root` depth-first and returns the collected items in traversal
 * order: at each level directories come before files, both sorted
 * case-insensitively by name. The root itself is not emitted; all
 * `relative_path`s are relative to it.
 *
 * An effectively unselected subdirectory is emitted with `selected: false`
 * and skipped, so consumers see that it exists but never see its contents.
 * An unselected root yields an empty stream. Unreadable entries are logged
 * and skipped; collection itself never fails.
 */
pub fn collect(
    root: &Path,
    store: &SelectionStore,
    matcher: &ExclusionMatcher,
) -> Vec<CollectedItem> {
    if !store.is_effectively_selected(root, root) {
        log::info!("SelectiveCollector: Root {root:?} is not selected; nothing to collect.");
        return Vec::new();
    }

    let mut items = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).sort_by(|a, b| {
        let a_dir = a.file_type().is_dir();
        let b_dir = b.file_type().is_dir();
        b_dir.cmp(&a_dir).then_with(|| {
            a.file_name()
                .to_string_lossy()
                .to_lowercase()
                .cmp(&b.file_name().to_string_lossy().to_lowercase())
        })
    });

    let mut iter = walker.into_iter();
    while let Some(entry) = iter.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("SelectiveCollector: Skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let Ok(relative_path) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative_path = relative_path.to_path_buf();

        if entry.file_type().is_dir() {
            let selected = store.is_effectively_selected(entry.path(), root);
            if !selected {
                iter.skip_current_dir();
            }
            items.push(CollectedItem {
                relative_path,
                is_dir: true,
                is_binary: false,
                selected,
            });
        } else if entry.file_type().is_file() {
            let filename = entry.file_name().to_string_lossy();
            if matcher.is_excluded_filename(&filename) {
                log::debug!("SelectiveCollector: Excluding {relative_path:?} by filename.");
                continue;
            }
            items.push(CollectedItem {
                relative_path,
                is_dir: false,
                is_binary: is_binary_file(entry.path()),
                selected: true,
            });
        }
        // Symlinks and other special file types are ignored.
    }
    items
}

/*
 * Classifies a file as binary. The forced-extension list decides first;
 * otherwise the first 1KB is sniffed for a null byte. A file that cannot be
 * read is assumed binary so that downstream consumers never try to inline
 * its content.
 */
pub fn is_binary_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().map(|n| n.to_string_lossy()) {
        if let Some(suffix) = compound_suffix(&name) {
            if FORCE_BINARY_EXTENSIONS.contains(&suffix.as_str()) {
                return true;
            }
        }
    }
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("Cannot read {path:?} to check if binary: {e}. Assuming binary.");
            return true;
        }
    };
    let mut buffer = [0u8; BINARY_SNIFF_BYTES];
    match file.read(&mut buffer) {
        Ok(read) => buffer[..read].contains(&0),
        Err(e) => {
            log::warn!("Cannot read {path:?} to check if binary: {e}. Assuming binary.");
            true
        }
    }
}

/*
 * The full lowercased suffix chain of a filename: "release.TAR.GZ" yields
 * ".tar.gz". A leading dot belongs to the stem, so ".DS_Store" has no
 * suffix and ".env.bak" yields ".bak".
 */
fn compound_suffix(filename: &str) -> Option<String> {
    let stem_start = filename.strip_prefix('.').unwrap_or(filename);
    stem_start
        .find('.')
        .map(|i| stem_start[i..].to_lowercase())
}
