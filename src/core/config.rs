/*
 * Persistence of the per-project configuration: the explicit folder check
 * states and the dynamic filename exclusion set, stored as one JSON document
 * inside the project's `_logs` directory. Folder paths are written relative
 * to the project root where possible so the document stays portable across
 * clones of the same tree; paths that cannot be made relative are kept
 * absolute as a documented fallback.
 *
 * A trait (`ConfigManagerOperations`) abstracts the storage so the
 * coordinator can be tested against mock backends; `CoreConfigManager` is
 * the concrete file-based implementation.
 */
use super::models::CheckState;
use super::project::ProjectContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    InvalidRoot(PathBuf),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Config serialization error: {e}"),
            ConfigError::InvalidRoot(p) => write!(f, "Invalid project root for config: {p:?}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * The on-disk shape of the project config. `folder_states` keys are
 * relative-or-absolute path strings; values are "checked"/"unchecked".
 * Values are kept as raw strings so a single unknown state can be skipped
 * with a warning instead of failing the whole document.
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    folder_states: HashMap<String, String>,
    #[serde(default)]
    dynamic_file_exclusions: Vec<String>,
}

/*
 * The loaded, resolved configuration handed back to the coordinator: folder
 * states keyed by absolute path (resolved against the current root), plus
 * the dynamic exclusion patterns.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedConfig {
    pub folder_states: HashMap<PathBuf, CheckState>,
    pub dynamic_exclusions: Vec<String>,
}

pub trait ConfigManagerOperations: Send + Sync {
    /*
     * Loads the config for a project root. A missing file is not an error
     * (empty config); an unreadable or malformed file is reported so the
     * caller can log it, but callers are expected to fall back to an empty
     * state rather than abort whatever triggered the load.
     */
    fn load(&self, project: &ProjectContext) -> Result<LoadedConfig>;

    /// Writes the config document for a project root, creating `_logs` if needed.
    fn save(
        &self,
        project: &ProjectContext,
        folder_states: &HashMap<PathBuf, CheckState>,
        dynamic_exclusions: &[String],
    ) -> Result<()>;
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load(&self, project: &ProjectContext) -> Result<LoadedConfig> {
        let root = project.root_path();
        if !root.is_dir() {
            return Err(ConfigError::InvalidRoot(root.to_path_buf()));
        }

        let config_path = project.resolve_config_file();
        if !config_path.exists() {
            log::debug!(
                "CoreConfigManager: No config file for '{}'; using defaults.",
                project.display_name()
            );
            return Ok(LoadedConfig::default());
        }

        let file = File::open(&config_path)?;
        let document: ConfigDocument = serde_json::from_reader(BufReader::new(file))?;

        let mut folder_states = HashMap::new();
        for (stored_path, state_str) in document.folder_states {
            let state = match state_str.as_str() {
                "checked" => CheckState::Checked,
                "unchecked" => CheckState::Unchecked,
                other => {
                    log::warn!(
                        "CoreConfigManager: Invalid folder state '{other}' for '{stored_path}'; skipping."
                    );
                    continue;
                }
            };
            let path = PathBuf::from(&stored_path);
            if path.is_absolute() {
                folder_states.insert(path, state);
            } else if stored_path == "." {
                folder_states.insert(root.to_path_buf(), state);
            } else {
                folder_states.insert(root.join(path), state);
            }
        }

        log::info!(
            "CoreConfigManager: Loaded config from {config_path:?} ({} folder states, {} dynamic exclusions).",
            folder_states.len(),
            document.dynamic_file_exclusions.len()
        );
        Ok(LoadedConfig {
            folder_states,
            dynamic_exclusions: document.dynamic_file_exclusions,
        })
    }

    fn save(
        &self,
        project: &ProjectContext,
        folder_states: &HashMap<PathBuf, CheckState>,
        dynamic_exclusions: &[String],
    ) -> Result<()> {
        let root = project.root_path();
        if !root.is_dir() {
            return Err(ConfigError::InvalidRoot(root.to_path_buf()));
        }
        project.ensure_logs_dir()?;

        let mut document = ConfigDocument::default();
        for (path, state) in folder_states {
            let value = match state {
                CheckState::Checked => "checked",
                CheckState::Unchecked => "unchecked",
            };
            document
                .folder_states
                .insert(relative_key(path, root), value.to_string());
        }
        let mut exclusions = dynamic_exclusions.to_vec();
        exclusions.sort();
        document.dynamic_file_exclusions = exclusions;

        let config_path = project.resolve_config_file();
        let file = File::create(&config_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &document)?;
        log::debug!("CoreConfigManager: Saved config to {config_path:?}.");
        Ok(())
    }
}

/*
 * Produces the storage key for a folder path: relative to the root where
 * possible ("." for the root itself), the absolute path as fallback for
 * entries outside the root.
 */
fn relative_key(path: &Path, root: &Path) -> String {
    if path == root {
        return ".".to_string();
    }
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_config_yields_defaults() {
        let dir = tempdir().unwrap();
        let project = ProjectContext::new(dir.path().to_path_buf());
        let manager = CoreConfigManager::new();

        let loaded = manager.load(&project).unwrap();
        assert!(loaded.folder_states.is_empty());
        assert!(loaded.dynamic_exclusions.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trips_states_and_exclusions() {
        // Arrange
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let project = ProjectContext::new(root.clone());
        let manager = CoreConfigManager::new();

        let mut states = HashMap::new();
        states.insert(root.clone(), CheckState::Checked);
        states.insert(root.join("src"), CheckState::Checked);
        states.insert(root.join("src/vendor"), CheckState::Unchecked);

        // Act
        manager
            .save(&project, &states, &["*.log".to_string()])
            .unwrap();
        let loaded = manager.load(&project).unwrap();

        // Assert
        assert_eq!(loaded.folder_states, states);
        assert_eq!(loaded.dynamic_exclusions, vec!["*.log".to_string()]);
    }

    #[test]
    fn test_paths_are_stored_relative_to_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let project = ProjectContext::new(root.clone());
        let manager = CoreConfigManager::new();

        let mut states = HashMap::new();
        states.insert(root.clone(), CheckState::Checked);
        states.insert(root.join("deep/nested"), CheckState::Unchecked);
        manager.save(&project, &states, &[]).unwrap();

        let raw = fs::read_to_string(project.resolve_config_file()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let keys: Vec<&str> = value["folder_states"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert!(keys.contains(&"."));
        assert!(keys.iter().any(|k| k.ends_with("nested") && !Path::new(k).is_absolute()));
    }

    #[test]
    fn test_absolute_fallback_for_paths_outside_root() {
        let dir = tempdir().unwrap();
        let project = ProjectContext::new(dir.path().to_path_buf());
        let manager = CoreConfigManager::new();

        let outside = PathBuf::from("/somewhere/else");
        let mut states = HashMap::new();
        states.insert(outside.clone(), CheckState::Unchecked);
        manager.save(&project, &states, &[]).unwrap();

        let loaded = manager.load(&project).unwrap();
        assert_eq!(
            loaded.folder_states.get(&outside),
            Some(&CheckState::Unchecked)
        );
    }

    #[test]
    fn test_malformed_config_is_reported_not_panicked() {
        let dir = tempdir().unwrap();
        let project = ProjectContext::new(dir.path().to_path_buf());
        project.ensure_logs_dir().unwrap();
        fs::write(project.resolve_config_file(), "{not json at all").unwrap();

        let manager = CoreConfigManager::new();
        assert!(matches!(
            manager.load(&project),
            Err(ConfigError::Serde(_))
        ));
    }

    #[test]
    fn test_unknown_state_string_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let project = ProjectContext::new(dir.path().to_path_buf());
        project.ensure_logs_dir().unwrap();
        fs::write(
            project.resolve_config_file(),
            r#"{ "folder_states": { "src": "checked", "docs": "sometimes" },
                 "dynamic_file_exclusions": [] }"#,
        )
        .unwrap();

        let loaded = CoreConfigManager::new().load(&project).unwrap();
        assert_eq!(loaded.folder_states.len(), 1);
        assert_eq!(
            loaded.folder_states.get(&dir.path().join("src")),
            Some(&CheckState::Checked)
        );
    }

    #[test]
    fn test_invalid_root_is_rejected() {
        let manager = CoreConfigManager::new();
        let project = ProjectContext::new(PathBuf::from("/definitely/not/a/real/root"));
        assert!(matches!(
            manager.load(&project),
            Err(ConfigError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_persisted_effective_selection_survives_reload() {
        // The round-trip property from the selection model's point of view:
        // saving and reloading reproduces is_effectively_selected for every
        // previously tracked path.
        use crate::core::selection::SelectionStore;

        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let project = ProjectContext::new(root.clone());
        let manager = CoreConfigManager::new();

        let mut store = SelectionStore::new();
        store.set_explicit(root.clone(), CheckState::Checked);
        store.set_explicit(root.join("src"), CheckState::Checked);
        store.set_explicit(root.join("src/vendor"), CheckState::Unchecked);
        store.set_explicit(root.join("docs"), CheckState::Checked);

        let states: HashMap<PathBuf, CheckState> =
            store.iter().map(|(p, s)| (p.clone(), *s)).collect();
        manager.save(&project, &states, &[]).unwrap();

        let mut reloaded = SelectionStore::new();
        reloaded.replace_all(manager.load(&project).unwrap().folder_states);

        for probe in [
            root.clone(),
            root.join("src"),
            root.join("src/vendor"),
            root.join("docs"),
        ] {
            assert_eq!(
                store.is_effectively_selected(&probe, &root),
                reloaded.is_effectively_selected(&probe, &root),
                "effective selection diverged for {probe:?}"
            );
        }
    }
}
