use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Ordered session sources; later sources win for a shared path
    #[serde(default)]
    pub sessions: Vec<SessionSource>,
    #[serde(default)]
    pub tmux: TmuxConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TmuxConfig {
    /// Leave sessions that already have a client out of the picker
    #[serde(default)]
    pub hide_attached_sessions: bool,
}

/// One configured origin of candidate directories plus what to run in them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionSource {
    /// A single glob pattern
    pub path: Option<String>,
    /// Additional glob patterns, expanded after `path`
    #[serde(default)]
    pub paths: Vec<String>,
    /// Environment applied to every pane and window of a new session
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Typed into the first pane after creation
    pub command: Option<String>,
    pub split: Option<PaneSplit>,
    /// Extra windows appended after the first one
    #[serde(default)]
    pub windows: Vec<WindowConfig>,
}

impl SessionSource {
    /// Glob patterns in expansion order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.path.iter().chain(self.paths.iter()).map(String::as_str)
    }
}

/// Second pane carved out of the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaneSplit {
    /// `h`/`horizontal` or `v`/`vertical`
    pub direction: String,
    /// Lines/columns (`20`) or a percentage (`30%`)
    pub size: Option<String>,
    pub command: Option<String>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WindowConfig {
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub command: Option<String>,
}

impl Config {
    /// Used when no config file can be loaded: every directory directly
    /// under the home directory.
    pub fn fallback() -> Self {
        Self {
            sessions: vec![SessionSource {
                path: Some("~/*".to_string()),
                ..Default::default()
            }],
            tmux: TmuxConfig::default(),
        }
    }
}

/// Default location: `<config dir>/sessionizer/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sessionizer").join("config.toml"))
}

/// Load the config, falling back to defaults unless the user named a file.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_from(path, true),
        None => match default_path() {
            Some(path) => load_from(&path, false),
            None => {
                info!("no config directory available, using defaults");
                Ok(Config::fallback())
            }
        },
    }
}

fn load_from(path: &Path, explicit: bool) -> Result<Config> {
    match read_config(path) {
        Ok(config) => {
            info!("using config file {}", path.display());
            debug!(?config);
            Ok(config)
        }
        Err(message) if explicit => Err(Error::Config {
            path: path.to_path_buf(),
            message,
        }),
        Err(message) => {
            info!(
                "could not load {} ({message}), using defaults",
                path.display()
            );
            Ok(Config::fallback())
        }
    }
}

fn read_config(path: &Path) -> std::result::Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    toml::from_str(&text).map_err(|e| e.to_string())
}

/// Everything a run needs, fixed once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sources: Vec<SessionSource>,
    pub hide_attached: bool,
    pub home: PathBuf,
}

impl Settings {
    pub fn new(config: Config, hide_attached: bool, home: PathBuf) -> Self {
        Self {
            hide_attached: hide_attached || config.tmux.hide_attached_sessions,
            sources: config.sessions,
            home,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[tmux]
hide_attached_sessions = true

[[sessions]]
path = "~/code/*"
paths = ["~/work/*", "/srv/app"]
command = "nvim ."
env = { EDITOR = "nvim" }
split = { direction = "horizontal", size = "30%", command = "git status", path = "~/notes", env = { A = "1" } }

[[sessions.windows]]
path = "~/logs"
command = "tail -f app.log"
env = { LOG = "1" }

[[sessions.windows]]

[[sessions]]
paths = ["~/scratch/*"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(FULL).unwrap();
        assert!(config.tmux.hide_attached_sessions);
        assert_eq!(config.sessions.len(), 2);

        let first = &config.sessions[0];
        assert_eq!(
            first.patterns().collect::<Vec<_>>(),
            vec!["~/code/*", "~/work/*", "/srv/app"]
        );
        assert_eq!(first.command.as_deref(), Some("nvim ."));
        assert_eq!(first.env.get("EDITOR").map(String::as_str), Some("nvim"));

        let split = first.split.as_ref().unwrap();
        assert_eq!(split.direction, "horizontal");
        assert_eq!(split.size.as_deref(), Some("30%"));
        assert_eq!(split.path, Some(PathBuf::from("~/notes")));
        assert_eq!(split.env.get("A").map(String::as_str), Some("1"));

        assert_eq!(first.windows.len(), 2);
        assert_eq!(first.windows[0].command.as_deref(), Some("tail -f app.log"));
        assert_eq!(first.windows[1], WindowConfig::default());

        let second = &config.sessions[1];
        assert_eq!(second.patterns().collect::<Vec<_>>(), vec!["~/scratch/*"]);
        assert!(second.split.is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_explicit_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sessions = 3").unwrap();
        assert!(matches!(load(Some(&path)), Err(Error::Config { .. })));
    }

    #[test]
    fn test_default_location_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[[sessions]\n").unwrap();

        let config = load_from(&path, false).unwrap();
        assert_eq!(config.sessions.len(), 1);
        assert_eq!(config.sessions[0].path.as_deref(), Some("~/*"));
        assert!(!config.tmux.hide_attached_sessions);
    }

    #[test]
    fn test_settings_merge_hide_flag() {
        let mut config = Config::fallback();
        assert!(Settings::new(config.clone(), true, PathBuf::from("/h")).hide_attached);
        assert!(!Settings::new(config.clone(), false, PathBuf::from("/h")).hide_attached);

        config.tmux.hide_attached_sessions = true;
        assert!(Settings::new(config, false, PathBuf::from("/h")).hide_attached);
    }
}
