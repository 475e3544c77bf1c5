//! YAML configuration loading.
//!
//! Search order inside the target directory: `config.yaml`, then
//! `.gitpulse/config.yaml`. Missing files fall back to built-in defaults.
//! A `.env` in the target directory is loaded first, then a cwd `.env`;
//! neither overrides variables that are already set. The API key may be
//! overridden by `CLAUDE_API_KEY` or `ANTHROPIC_API_KEY` (in that order).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;
use crate::env::Env;

/// Errors during config loading or writing.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to watch. Absolutized at startup so the watcher, git
    /// shell-outs, and history file all work regardless of cwd.
    pub watch_path: PathBuf,
    /// Safety timer in seconds; auto-flushes if the operator forgets to
    /// trigger a push. Not the watcher's short coalescing window.
    pub debounce_seconds: u64,
    pub auto_push: bool,
    pub remote: String,
    pub branch: String,
    pub ai: AiConfig,
    /// Shell globs matched against basenames; a trailing `/` marks a
    /// directory entry and is ignored for matching purposes.
    pub ignore_patterns: Vec<String>,
}

/// AI provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Run the review gate before committing.
    pub code_review: bool,
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("code_review", &self.code_review)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            code_review: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_path: PathBuf::from("."),
            debounce_seconds: 900,
            auto_push: true,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            ai: AiConfig::default(),
            ignore_patterns: vec![
                "*.log".to_string(),
                "node_modules/".to_string(),
                ".git/".to_string(),
                "vendor/".to_string(),
                "target/".to_string(),
                ".gitpulse/".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration for the project rooted at `dir`.
    ///
    /// Loads `.env` files (project first, then cwd), reads the first config
    /// file found, applies `watch_path` when given, and resolves the API
    /// key from the environment.
    pub fn load_from_dir(
        dir: &Path,
        watch_path: Option<&Path>,
        env: &Env,
    ) -> Result<Self, ConfigError> {
        // Project .env first so `-C /path/to/repo` picks up that repo's
        // key, then the cwd .env. Existing variables are never overridden.
        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        let candidates = [
            dir.join(constants::CONFIG_FILENAME),
            dir.join(constants::STATE_DIR).join(constants::CONFIG_FILENAME),
        ];
        for path in candidates {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    config = serde_yaml::from_str(&content)
                        .map_err(|e| ConfigError::ParseFile { path, source: e })?;
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::ReadFile { path, source: e }),
            }
        }

        if let Some(wp) = watch_path {
            config.watch_path = wp.to_path_buf();
        }
        config.apply_env(env);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env(&mut self, env: &Env) {
        if let Some(key) = env.first_of(&[
            constants::ENV_CLAUDE_API_KEY,
            constants::ENV_ANTHROPIC_API_KEY,
        ]) {
            self.ai.api_key = Some(key);
        }
    }

    /// Write the default config to `dir/.gitpulse/config.yaml`, creating
    /// the state directory when needed. Returns the written path.
    pub fn write_default(dir: &Path) -> Result<PathBuf, ConfigError> {
        let state_dir = dir.join(constants::STATE_DIR);
        std::fs::create_dir_all(&state_dir).map_err(|e| ConfigError::WriteFile {
            path: state_dir.clone(),
            source: e,
        })?;

        let path = state_dir.join(constants::CONFIG_FILENAME);
        let yaml = serde_yaml::to_string(&Config::default()).expect("default config serializes");
        std::fs::write(&path, yaml).map_err(|e| ConfigError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Append `entries` to the gitignore at `path` when absent, creating the
/// file when missing. Returns `true` if the file was modified.
pub fn append_gitignore_entries(path: &Path, entries: &[&str]) -> bool {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let content = format!("# GitPulse\n{}\n", entries.join("\n"));
            return std::fs::write(path, content).is_ok();
        }
        Err(_) => return false,
    };

    let mut updated = content.clone();
    let mut modified = false;
    for entry in entries {
        if !content.lines().any(|line| line.trim() == entry.trim()) {
            updated = format!("{}\n{}\n", updated.trim_end_matches('\n'), entry);
            modified = true;
        }
    }
    if modified && std::fs::write(path, updated).is_err() {
        return false;
    }
    modified
}
