/*
 * Text report writers: the tree-map export and the content dump. Both
 * consume the SelectiveCollector's item stream rather than walking the
 * filesystem themselves, so selection and exclusion decisions are made in
 * exactly one place. Outputs land in timestamped files under the project's
 * `_logs` tree.
 */
use super::exclusions::{EXCLUDED_FOLDERS, PREDEFINED_EXCLUDED_FILENAMES};
use super::models::CollectedItem;
use super::project::{
    LOG_SUBDIR_DUMP, LOG_SUBDIR_TREE, ProjectContext, header_timestamp, timestamped_name,
};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Per-file content cap in the dump; larger files get an omission marker.
const MAX_DUMP_FILE_SIZE: u64 = 1024 * 1024;

const GLYPH_CHECKED: &str = "[X]";
const GLYPH_UNCHECKED: &str = "[ ]";

/*
 * Writes the tree-map export: a header block naming the root and the active
 * exclusion sets, then a connector-drawn tree. Directories carry a checked
 * or unchecked glyph by effective selection; unselected directories appear
 * as leaves because the collector never descended into them. Files carry a
 * " (Binary)" tag when classified binary.
 *
 * Returns the path of the written file.
 */
pub fn export_tree_map(
    ctx: &ProjectContext,
    items: &[CollectedItem],
    root_selected: bool,
    dynamic_patterns: &[String],
) -> io::Result<PathBuf> {
    let mut lines = header_lines(ctx, dynamic_patterns);

    let root_glyph = if root_selected {
        GLYPH_CHECKED
    } else {
        GLYPH_UNCHECKED
    };
    lines.push(format!(
        "{root_glyph} {}/ (Project Root)",
        ctx.display_name()
    ));
    if root_selected {
        let children = children_by_parent(items);
        render_level(Path::new(""), "  ", &children, &mut lines);
    }

    let output_dir = ctx.ensure_output_dir(LOG_SUBDIR_TREE)?;
    let output_path = output_dir.join(timestamped_name("project_tree", ".txt"));
    fs::write(&output_path, lines.join("\n"))?;
    log::info!("Project tree map saved to {output_path:?}.");
    Ok(output_path)
}

fn header_lines(ctx: &ProjectContext, dynamic_patterns: &[String]) -> Vec<String> {
    let mut folder_exclusions: Vec<&str> = EXCLUDED_FOLDERS.to_vec();
    folder_exclusions.sort_unstable();
    let mut filename_exclusions: Vec<&str> = PREDEFINED_EXCLUDED_FILENAMES.to_vec();
    filename_exclusions.sort_unstable();
    let dynamic = if dynamic_patterns.is_empty() {
        "None".to_string()
    } else {
        let mut sorted = dynamic_patterns.to_vec();
        sorted.sort_unstable();
        sorted.join(", ")
    };
    vec![
        format!("Project Root: {}", ctx.root_path().display()),
        format!("Generated: {}", header_timestamp()),
        format!(
            "Global Default Folder Exclusions: {}",
            folder_exclusions.join(", ")
        ),
        format!(
            "Predefined Filename Exclusions: {}",
            filename_exclusions.join(", ")
        ),
        format!("Dynamic Filename Exclusions: {dynamic}"),
        String::new(),
    ]
}

/*
 * Groups the collector's flat depth-first stream by parent directory. The
 * per-parent order of the stream (directories before files, names sorted
 * case-insensitively) is preserved, which is exactly the render order.
 */
fn children_by_parent(items: &[CollectedItem]) -> HashMap<PathBuf, Vec<&CollectedItem>> {
    let mut children: HashMap<PathBuf, Vec<&CollectedItem>> = HashMap::new();
    for item in items {
        let parent = item
            .relative_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        children.entry(parent).or_default().push(item);
    }
    children
}

fn render_level(
    dir: &Path,
    prefix: &str,
    children: &HashMap<PathBuf, Vec<&CollectedItem>>,
    lines: &mut Vec<String>,
) {
    let Some(entries) = children.get(dir) else {
        return;
    };
    for (i, item) in entries.iter().enumerate() {
        let is_last = i == entries.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };
        let name = display_file_name(&item.relative_path);

        if item.is_dir {
            let glyph = if item.selected {
                GLYPH_CHECKED
            } else {
                GLYPH_UNCHECKED
            };
            lines.push(format!("{prefix}{connector}{glyph} {name}/"));
            if item.selected {
                let continuation = if is_last { "    " } else { "│   " };
                render_level(
                    &item.relative_path,
                    &format!("{prefix}{continuation}"),
                    children,
                    lines,
                );
            }
        } else {
            let binary_tag = if item.is_binary { " (Binary)" } else { "" };
            lines.push(format!("{prefix}{connector}{name}{binary_tag}"));
        }
    }
}

fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/*
 * Writes the content dump: one delimited section per included file. Binary
 * files, files over the 1 MiB cap, and files that fail to read get an
 * omission marker instead of content; such sections never abort the batch
 * and do not count as dumped. When not a single file's content made it in,
 * no dump file is written at all.
 *
 * Returns the written path, or None when nothing was dumped.
 */
pub fn export_content_dump(
    ctx: &ProjectContext,
    items: &[CollectedItem],
) -> io::Result<Option<PathBuf>> {
    let mut dump = format!(
        "File Dump from Project: {}\nGenerated: {}\n",
        ctx.root_path().display(),
        header_timestamp()
    );
    let mut files_dumped = 0usize;

    for item in items.iter().filter(|i| i.is_included_file()) {
        let rel_display = item.relative_path.display().to_string();
        let header = file_section_header(&rel_display);
        let footer = format!("\n{}\n", "-".repeat(80));
        let absolute = ctx.root_path().join(&item.relative_path);

        if item.is_binary {
            dump.push_str(&header);
            dump.push_str("[CONTENT OMITTED: Detected as binary]\n");
            dump.push_str(&footer);
            continue;
        }
        match fs::metadata(&absolute) {
            Ok(meta) if meta.len() > MAX_DUMP_FILE_SIZE => {
                dump.push_str(&header);
                dump.push_str("[CONTENT OMITTED: File size > 1MB]\n");
                dump.push_str(&footer);
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                dump.push_str(&header);
                dump.push_str(&format!("[CONTENT OMITTED: Error during processing - {e}]\n"));
                dump.push_str(&footer);
                continue;
            }
        }
        match fs::read(&absolute) {
            Ok(bytes) => {
                dump.push_str(&header);
                dump.push_str(&String::from_utf8_lossy(&bytes));
                dump.push_str(&footer);
                files_dumped += 1;
            }
            Err(e) => {
                log::warn!("Content dump: Cannot read {absolute:?}: {e}");
                dump.push_str(&header);
                dump.push_str(&format!("[CONTENT OMITTED: Error during processing - {e}]\n"));
                dump.push_str(&footer);
            }
        }
    }

    if files_dumped == 0 {
        log::info!("Content dump: No text files were selected or found to dump.");
        return Ok(None);
    }

    let output_dir = ctx.ensure_output_dir(LOG_SUBDIR_DUMP)?;
    let output_path = output_dir.join(timestamped_name("project_file_dump", ".txt"));
    fs::write(&output_path, dump)?;
    log::info!("Content dump: {files_dumped} file sections saved to {output_path:?}.");
    Ok(Some(output_path))
}

/// "\n{20 dashes} FILE: {rel} {dashes padding the name to 60 columns}\n"
fn file_section_header(rel_display: &str) -> String {
    let pad = 60usize.saturating_sub(rel_display.len());
    format!("\n{} FILE: {rel_display} {}\n", "-".repeat(20), "-".repeat(pad))
}
