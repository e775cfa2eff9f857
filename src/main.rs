/*
 * Command-line front-end. All invariants live in `core` and `app_logic`;
 * this layer parses arguments, wires up logging, answers scan timeout
 * questions on stdin, and prints where the artifacts went.
 */
mod app_logic;
mod core;

use crate::app_logic::{ScanTimeoutPrompt, SessionCoordinator};
use crate::core::{
    CoreConfigManager, MAX_SCAN_BUDGET, Projection, ProjectContext, ScanOutcome, TimeoutDecision,
};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

struct CliArgs {
    root: PathBuf,
    tree: bool,
    dump: bool,
    backup: bool,
}

fn parse_args<I: Iterator<Item = String>>(args: I) -> Result<CliArgs, String> {
    let mut root = None;
    let mut tree = false;
    let mut dump = false;
    let mut backup = false;
    for arg in args {
        match arg.as_str() {
            "--tree" => tree = true,
            "--dump" => dump = true,
            "--backup" => backup = true,
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown option '{flag}'"));
            }
            path => {
                if root.replace(PathBuf::from(path)).is_some() {
                    return Err("More than one project root given".to_string());
                }
            }
        }
    }
    let root = root.ok_or_else(|| "No project root given".to_string())?;
    Ok(CliArgs {
        root,
        tree,
        dump,
        backup,
    })
}

/*
 * Terminal logger always; a session file logger under
 * `_logs/_appSESSION_logs/` when that directory can be created. Logging must
 * never prevent the run, so a failed session file falls back silently to
 * terminal-only.
 */
fn init_logging(ctx: &ProjectContext) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    match ctx.ensure_output_dir(crate::core::project::LOG_SUBDIR_SESSION) {
        Ok(session_dir) => {
            let log_path =
                session_dir.join(crate::core::project::timestamped_name("session", ".log"));
            match File::create(&log_path) {
                Ok(file) => {
                    loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
                }
                Err(e) => eprintln!("Warning: cannot create session log {log_path:?}: {e}"),
            }
        }
        Err(e) => eprintln!("Warning: cannot create session log directory: {e}"),
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Warning: logger initialization failed: {e}");
    }
}

/// Asks on the terminal whether a scan that exceeded its budget should go on.
struct StdinTimeoutPrompt;

impl ScanTimeoutPrompt for StdinTimeoutPrompt {
    fn should_continue(&self, root: &Path, elapsed: Duration) -> TimeoutDecision {
        println!(
            "Scanning {} has taken {}s. Continue? [y/N] ",
            root.display(),
            elapsed.as_secs()
        );
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return TimeoutDecision::Abort;
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "c" | "continue" => TimeoutDecision::Continue,
            _ => TimeoutDecision::Abort,
        }
    }
}

fn print_selection_summary(coordinator: &SessionCoordinator, root: &Path) {
    let snapshot = coordinator.snapshot();
    let mut fully = 0usize;
    let mut mixed = 0usize;
    let mut off = 0usize;
    for entry in &snapshot.entries {
        match coordinator.projection_of(&entry.path) {
            Some(Projection::FullyChecked) => fully += 1,
            Some(Projection::Mixed) => mixed += 1,
            Some(Projection::FullyUnchecked) => off += 1,
            None => {}
        }
    }
    println!(
        "Scanned {} directories under {}.",
        snapshot.directory_count(),
        root.display()
    );
    println!("Selection: {fully} fully checked, {mixed} mixed, {off} unchecked.");
}

fn run() -> Result<(), String> {
    let args = parse_args(std::env::args().skip(1))
        .map_err(|e| format!("{e}\nUsage: project_mapper <root> [--tree] [--dump] [--backup]"))?;

    let root = args
        .root
        .canonicalize()
        .map_err(|e| format!("Cannot resolve project root {:?}: {e}", args.root))?;
    init_logging(&ProjectContext::new(root.clone()));

    let mut coordinator = SessionCoordinator::new(
        Arc::new(CoreConfigManager::new()),
        Arc::new(StdinTimeoutPrompt),
        MAX_SCAN_BUDGET,
    );
    coordinator.open_project(root.clone());
    coordinator.wait_for_scan();

    match coordinator.last_scan_outcome() {
        Some(ScanOutcome::Completed) => {}
        Some(ScanOutcome::TimedOutAborted) => {
            log::warn!("Scan aborted on timeout; exports will cover the scanned part only.");
        }
        Some(ScanOutcome::Failed(message)) => {
            return Err(format!("Scan failed: {message}"));
        }
        Some(ScanOutcome::Cancelled) | None => {
            return Err("Scan did not complete".to_string());
        }
    }

    if !(args.tree || args.dump || args.backup) {
        print_selection_summary(&coordinator, &root);
        return Ok(());
    }

    if args.tree {
        let path = coordinator
            .export_tree()
            .map_err(|e| format!("Tree export failed: {e}"))?;
        println!("Tree map written to {}", path.display());
    }
    if args.dump {
        match coordinator
            .export_dump()
            .map_err(|e| format!("Content dump failed: {e}"))?
        {
            Some(path) => println!("Content dump written to {}", path.display()),
            None => println!("No text file content to dump."),
        }
    }
    if args.backup {
        match coordinator
            .export_backup()
            .map_err(|e| format!("Backup failed: {e}"))?
        {
            Some(path) => println!("Backup written to {}", path.display()),
            None => println!("No files selected; no backup written."),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
