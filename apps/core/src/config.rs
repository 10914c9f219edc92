use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io error: {error}"),
            Self::Parse(error) => write!(f, "config parse error: {error}"),
            Self::Invalid(error) => write!(f, "invalid config: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many ranked items a filter response carries; 0 means all of them.
    pub limit: usize,
    /// Characters that end a word for word erasing, besides space.
    pub word_delimiters: String,
    /// The coarser delimiter set for big-word erasing.
    pub big_word_delimiters: String,
    /// Separator that bounds completion candidates, e.g. "/" for paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_sep: Option<String>,
    /// Accepted inputs are kept per key; no key disables history entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_key: Option<String>,
    pub history_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Whether the raw input may be accepted when nothing matches it.
    pub accept_input: bool,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = std::env::temp_dir().join("quickpick");
        Self {
            limit: 20,
            word_delimiters: String::new(),
            big_word_delimiters: "/".to_string(),
            completion_sep: None,
            history_key: None,
            history_path: base.join("history.json"),
            log_path: None,
            accept_input: false,
            config_path: base.join("config.toml"),
        }
    }
}

/// Reads the config at `path` (or the default location), falling back to
/// defaults when no file exists yet. A file that is present but unreadable is
/// an error.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let default = Config::default();
    let config_path = path.map(Path::to_path_buf).unwrap_or(default.config_path);

    let mut config = if config_path.exists() {
        let raw = fs::read_to_string(&config_path)?;
        toml::from_str::<Config>(&raw).map_err(|error| ConfigError::Parse(error.to_string()))?
    } else {
        Config::default()
    };
    config.config_path = config_path;

    validate(&config)?;
    Ok(config)
}

pub fn save(config: &Config) -> Result<(), ConfigError> {
    validate(config)?;
    if let Some(dir) = config.config_path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = toml::to_string_pretty(config)
        .map_err(|error| ConfigError::Parse(error.to_string()))?;
    fs::write(&config.config_path, raw)?;
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.limit > 100_000 {
        return Err(ConfigError::Invalid("limit out of range".into()));
    }

    if let Some(sep) = &config.completion_sep {
        if sep.is_empty() {
            return Err(ConfigError::Invalid("completion_sep must not be empty".into()));
        }
    }

    if let Some(key) = &config.history_key {
        if key.is_empty() {
            return Err(ConfigError::Invalid("history_key must not be empty".into()));
        }
        if config.history_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("history_path is required".into()));
        }
    }

    Ok(())
}

impl Config {
    pub fn word_delimiter_chars(&self) -> Vec<char> {
        self.word_delimiters.chars().collect()
    }

    pub fn big_word_delimiter_chars(&self) -> Vec<char> {
        self.big_word_delimiters.chars().collect()
    }
}
