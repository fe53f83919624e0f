//! Persisted config (notes root, index settings) in the app data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::chunks::DEFAULT_MAX_CHARS;
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_TOP_K: usize = 6;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_MAX_OUTPUT_TOKENS: i32 = 500;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the user's notes directory (chosen by them).
    pub notes_root: Option<String>,
    #[serde(default)]
    pub index: IndexSettings,
}

/// Settings the index needs from the surrounding app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub ollama_url: String,
    pub embed_model: String,
    /// Only passed through to the answering model.
    pub chat_model: String,
    /// Maximum characters per chunk.
    pub chunk_char_limit: usize,
    /// Maximum matches returned by a query. The query engine treats 0 as
    /// unlimited, but [`IndexSettings::normalized`] replaces it with the default.
    pub top_k: usize,
    /// Maximum matches handed to the answering model.
    pub max_context_chunks: usize,
    /// Sampling temperature for answers, within `[0, 2]`.
    pub temperature: f32,
    /// Cap on tokens generated per answer. Non-positive values use the default.
    pub max_output_tokens: i32,
    /// Deadline for a single provider call. 0 disables the deadline.
    pub request_timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_BASE_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chunk_char_limit: DEFAULT_MAX_CHARS,
            top_k: DEFAULT_TOP_K,
            max_context_chunks: DEFAULT_TOP_K,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl IndexSettings {
    /// Replaces blank or zero values with defaults. `max_context_chunks`
    /// falls back to `top_k`, the temperature is clamped to `[0, 2]`, and a
    /// zero `request_timeout_secs` is kept (no deadline).
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.ollama_url.trim().is_empty() {
            self.ollama_url = defaults.ollama_url;
        }
        if self.embed_model.trim().is_empty() {
            self.embed_model = defaults.embed_model;
        }
        if self.chat_model.trim().is_empty() {
            self.chat_model = defaults.chat_model;
        }
        if self.chunk_char_limit == 0 {
            self.chunk_char_limit = defaults.chunk_char_limit;
        }
        if self.top_k == 0 {
            self.top_k = defaults.top_k;
        }
        if self.max_context_chunks == 0 {
            self.max_context_chunks = self.top_k;
        }
        if self.temperature.is_nan() {
            self.temperature = defaults.temperature;
        }
        self.temperature = self.temperature.clamp(0.0, MAX_TEMPERATURE);
        if self.max_output_tokens <= 0 {
            self.max_output_tokens = defaults.max_output_tokens;
        }
        self
    }

    /// `Duration::ZERO` means no deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    let Some(data_dir) = app_data::app_data_dir() else {
        return Config::default();
    };
    load_config_from(&data_dir.join(CONFIG_FILENAME))
}

fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    let mut config: Config = match toml::from_str(&s) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
            Config::default()
        }
    };
    config.index = config.index.normalized();
    config
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(&data_dir.join(CONFIG_FILENAME), config)
}

fn save_config_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Get the configured notes root path, if any.
pub fn get_notes_root() -> Option<PathBuf> {
    load_config()
        .notes_root
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Set and persist the notes root.
pub fn set_notes_root(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_dir() {
        return Err(ConfigError::NotADirectory(path));
    }
    let mut config = load_config();
    config.notes_root = Some(path.to_string_lossy().into_owned());
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join(CONFIG_FILENAME));
        assert!(config.notes_root.is_none());
        assert_eq!(config.index, IndexSettings::default());
    }

    #[test]
    fn partial_index_table_is_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            "notes_root = \"/notes\"\n[index]\nembed_model = \"all-minilm\"\ntop_k = 0\nchunk_char_limit = 800\n",
        )
        .unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.notes_root.as_deref(), Some("/notes"));
        assert_eq!(config.index.embed_model, "all-minilm");
        assert_eq!(config.index.top_k, DEFAULT_TOP_K);
        assert_eq!(config.index.max_context_chunks, DEFAULT_TOP_K);
        assert_eq!(config.index.chunk_char_limit, 800);
        assert_eq!(config.index.ollama_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_toml_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "notes_root = [").unwrap();
        assert!(load_config_from(&path).notes_root.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let mut config = Config {
            notes_root: Some("/n".into()),
            ..Config::default()
        };
        config.index.top_k = 3;
        save_config_to(&path, &config).unwrap();

        let back = load_config_from(&path);
        assert_eq!(back.notes_root.as_deref(), Some("/n"));
        assert_eq!(back.index.top_k, 3);
        assert_eq!(back.index.max_context_chunks, DEFAULT_TOP_K);
    }

    #[test]
    fn max_context_defaults_to_top_k() {
        let s = IndexSettings {
            top_k: 4,
            max_context_chunks: 0,
            ..IndexSettings::default()
        }
        .normalized();
        assert_eq!(s.max_context_chunks, 4);
    }

    #[test]
    fn zero_timeout_survives_normalisation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[index]\nrequest_timeout_secs = 0\n").unwrap();

        let config = load_config_from(&path);
        assert_eq!(config.index.request_timeout_secs, 0);
        assert_eq!(config.index.request_timeout(), Duration::ZERO);
    }

    #[test]
    fn generation_options_have_defaults_and_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[index]\ntop_k = 2\n").unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.index.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.index.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);

        let hot = IndexSettings {
            temperature: 7.5,
            max_output_tokens: 0,
            ..IndexSettings::default()
        }
        .normalized();
        assert_eq!(hot.temperature, MAX_TEMPERATURE);
        assert_eq!(hot.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);

        let cold = IndexSettings {
            temperature: -1.0,
            max_output_tokens: -3,
            ..IndexSettings::default()
        }
        .normalized();
        assert_eq!(cold.temperature, 0.0);
        assert_eq!(cold.max_output_tokens, DEFAULT_MAX_OUTPUT_TOKENS);

        let nan = IndexSettings {
            temperature: f32::NAN,
            ..IndexSettings::default()
        }
        .normalized();
        assert_eq!(nan.temperature, DEFAULT_TEMPERATURE);
    }
}
