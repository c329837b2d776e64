use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{self, Config};
use crate::constants::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub title: String,
    pub author: String,
    /// Empty when the entry had none; navigating to it fails.
    pub url: String,
}

impl Project {
    pub fn new(title: impl Into<String>, author: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            url: url.into(),
        }
    }

    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Deserialize)]
struct ProjectEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    author: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    url: Option<String>,
}

/// A string, or nothing. Other JSON types are ignored with a warning.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => {
            warn!(value = %other, "ignoring project field that is not a string");
            Ok(None)
        }
    }
}

impl From<ProjectEntry> for Project {
    fn from(entry: ProjectEntry) -> Self {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Project {
            title: non_empty(entry.title).unwrap_or_else(|| UNTITLED.to_string()),
            author: non_empty(entry.author).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            url: entry.url.map(|u| u.trim().to_string()).unwrap_or_default(),
        }
    }
}

/// The ordered projects and their options, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub config: Config,
    pub projects: Vec<Project>,
}

impl Playlist {
    pub fn new(config: Config, projects: Vec<Project>) -> Result<Self, ConfigError> {
        if projects.is_empty() {
            return Err(ConfigError::NoProjectsLoaded);
        }
        Ok(Self { config, projects })
    }

    /// Interprets an already-parsed playlist: `{ config?, projects }` or a bare project array.
    /// `overrides` is merged over the `config` block.
    pub fn from_value(value: Value, overrides: Option<&Value>) -> Result<Self, ConfigError> {
        let (mut config_block, projects) = match value {
            Value::Array(projects) => (Value::Null, projects),
            Value::Object(mut map) => {
                let config = map.remove("config").unwrap_or(Value::Null);
                let projects = match map.remove("projects") {
                    Some(Value::Array(projects)) => projects,
                    Some(_) => return Err(ConfigError::Parse("\"projects\" must be an array".into())),
                    None => return Err(ConfigError::NoProjectsLoaded),
                };
                (config, projects)
            }
            _ => {
                return Err(ConfigError::Parse(
                    "expected an object with \"projects\" or an array of projects".into(),
                ));
            }
        };

        if let Some(overrides) = overrides {
            config::merge(&mut config_block, overrides);
        }

        let projects = projects
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                if !entry.is_object() {
                    return Err(ConfigError::Parse(format!("project {i} is not an object")));
                }
                let entry: ProjectEntry = serde_json::from_value(entry)
                    .map_err(|e| ConfigError::Parse(format!("project {i}: {e}")))?;
                Ok(Project::from(entry))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, project) in projects.iter().enumerate() {
            if !project.has_url() {
                warn!(index = i, title = %project.title, "project has no url and cannot be shown");
            }
        }

        Playlist::new(Config::from_json(&config_block), projects)
    }

    pub fn load(path: &Path, overrides: Option<&Value>) -> Result<Self, ConfigError> {
        let value = read_json(path)?;
        let playlist = Playlist::from_value(value, overrides)?;
        info!(path = %path.display(), projects = playlist.len(), "playlist loaded");
        Ok(playlist)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Project> {
        self.projects.get(index)
    }
}

pub fn read_json(path: &Path) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Places a playlist is looked for, in order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(PLAYLIST_FILE_NAME)];
    if let Some(path) = env::var_os(PLAYLIST_ENV_VAR) {
        paths.push(PathBuf::from(path));
    }
    let home = env::var_os("HOME").map(PathBuf::from);
    match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) => paths.push(PathBuf::from(dir).join("kiosk").join(PLAYLIST_FILE_NAME)),
        None => {
            if let Some(home) = &home {
                paths.push(home.join(".config").join("kiosk").join(PLAYLIST_FILE_NAME));
            }
        }
    }
    if let Some(home) = home {
        paths.push(home.join(PLAYLIST_FILE_NAME));
    }
    paths
}

pub fn discover(candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}
