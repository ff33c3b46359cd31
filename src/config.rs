// Local configuration file (`~/.freck`).
//
// The format is deliberately tiny: one `key: value` pair per line, `#`
// starts a comment that runs to the end of the line, blank lines are
// ignored. Only the keys in `ConfigKey` are accepted.

use crate::error::{FreckError, FreckResult};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".freck";

/// Keys recognised in the configuration file, in the order they are saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Subdomain,
    User,
    Token,
    UserId,
    Project,
    Tags,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::Subdomain,
        ConfigKey::User,
        ConfigKey::Token,
        ConfigKey::UserId,
        ConfigKey::Project,
        ConfigKey::Tags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Subdomain => "subdomain",
            ConfigKey::User => "user",
            ConfigKey::Token => "token",
            ConfigKey::UserId => "user_id",
            ConfigKey::Project => "project",
            ConfigKey::Tags => "tags",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// In-memory configuration record. Every key is optional; an empty value
/// is kept as-is so that `project: ` survives a save/load cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub subdomain: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub project: Option<String>,
    pub tags: Option<String>,
}

impl Config {
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        let slot = match key {
            ConfigKey::Subdomain => &self.subdomain,
            ConfigKey::User => &self.user,
            ConfigKey::Token => &self.token,
            ConfigKey::UserId => &self.user_id,
            ConfigKey::Project => &self.project,
            ConfigKey::Tags => &self.tags,
        };
        slot.as_deref()
    }

    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        let slot = match key {
            ConfigKey::Subdomain => &mut self.subdomain,
            ConfigKey::User => &mut self.user,
            ConfigKey::Token => &mut self.token,
            ConfigKey::UserId => &mut self.user_id,
            ConfigKey::Project => &mut self.project,
            ConfigKey::Tags => &mut self.tags,
        };
        *slot = Some(value.into());
    }

    /// Default project name, ignoring a blank value.
    pub fn default_project(&self) -> Option<&str> {
        self.project.as_deref().filter(|p| !p.is_empty())
    }

    /// Default tags as a comma-separated string (possibly empty).
    pub fn default_tags(&self) -> &str {
        self.tags.as_deref().unwrap_or("")
    }

    pub fn subdomain(&self) -> &str {
        self.subdomain.as_deref().unwrap_or("")
    }
}

/// Parse the text of a configuration file. `origin` is only used to name
/// the file in error messages.
pub fn parse(text: &str, origin: &str) -> FreckResult<Config> {
    let mut config = Config::default();

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let (key, value) = match line.split_once(':') {
            Some((key, value)) if !key.is_empty() => (key, value.trim_start()),
            _ => {
                return Err(FreckError::ConfigSyntax {
                    path: origin.to_string(),
                    line_number,
                    line: line.to_string(),
                })
            }
        };

        let Some(key) = ConfigKey::from_name(key) else {
            return Err(FreckError::ConfigUnknownKey {
                path: origin.to_string(),
                key: key.to_string(),
                line_number,
            });
        };
        config.set(key, value);
    }

    Ok(config)
}

/// Render a configuration record in the file format, one line per present key.
pub fn render(config: &Config) -> String {
    ConfigKey::ALL
        .into_iter()
        .filter_map(|key| config.get(key).map(|value| format!("{}: {}\n", key.as_str(), value)))
        .collect()
}

/// Owns the location of the configuration file. Nothing else reads or
/// writes that path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    /// `~/.freck`, falling back to the current directory when no home
    /// directory can be determined.
    pub fn default_location() -> Self {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(dir.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file. `Ok(None)` means there is no file yet and the
    /// interactive setup should run.
    pub fn load(&self) -> FreckResult<Option<Config>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        parse(&text, &self.path.display().to_string()).map(Some)
    }

    /// Overwrite the file with `config` and return the path written.
    pub fn save(&self, config: &Config) -> FreckResult<&Path> {
        fs::write(&self.path, render(config))?;
        tracing::debug!("Wrote configuration to {}", self.path.display());
        Ok(&self.path)
    }
}
