//! TOML configuration parsing and validation.
//!
//! Every section except `[db]` has defaults, so a config file may be as
//! small as:
//!
//! ```toml
//! [db]
//! path = "./data/ptx.sqlite"
//! ```
//!
//! `[[rules]]` entries, when present, replace the built-in rule table.

use anyhow::{bail, Context, Result};
use parallel_text_core::chunk::DEFAULT_CHUNK_SIZE;
use parallel_text_core::rules::{RuleDef, RuleSet};
use parallel_text_core::search::{Prefilter, MAX_LIMIT, MIN_LIMIT};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[mail].password`.
pub const SMTP_PASSWORD_ENV: &str = "PTX_SMTP_PASSWORD";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size; defaults to one connection per worker plus one.
    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: i64,
    #[serde(default)]
    pub prefilter: Prefilter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            candidate_k: default_candidate_k(),
            prefilter: Prefilter::default(),
        }
    }
}

fn default_limit() -> i64 {
    20
}
fn default_candidate_k() -> i64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkersConfig {
    #[serde(default = "default_max_blocking")]
    pub max_blocking: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            max_blocking: default_max_blocking(),
        }
    }
}

fn default_max_blocking() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address; defaults to `username`.
    #[serde(default)]
    pub from: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl MailConfig {
    pub fn from_address(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.username)
    }

    /// Password from the environment, falling back to the config file.
    pub fn resolved_password(&self) -> Option<String> {
        std::env::var(SMTP_PASSWORD_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .or_else(|| self.password.clone())
    }
}

impl Config {
    /// Configuration with defaults everywhere and the given database path.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: path.into(),
                max_connections: None,
            },
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            workers: WorkersConfig::default(),
            server: ServerConfig::default(),
            mail: None,
            rules: Vec::new(),
        }
    }

    /// Connections to open against SQLite. Each worker job may hold one
    /// while the server keeps another for reads.
    pub fn pool_size(&self) -> u32 {
        self.db.max_connections.unwrap_or_else(|| {
            u32::try_from(self.workers.max_blocking)
                .unwrap_or(u32::MAX)
                .saturating_add(1)
        })
    }

    /// The configured rule table, or the built-in one when none is given.
    pub fn rule_set(&self) -> Result<RuleSet> {
        if self.rules.is_empty() {
            return Ok(RuleSet::builtin());
        }
        RuleSet::new(self.rules.clone()).context("invalid [[rules]] table")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == Some(0) {
        bail!("db.max_connections must be > 0");
    }

    if config.chunking.size == 0 {
        bail!("chunking.size must be > 0");
    }

    if !(MIN_LIMIT..=MAX_LIMIT).contains(&config.search.default_limit) {
        bail!(
            "search.default_limit must be in [{}, {}]",
            MIN_LIMIT,
            MAX_LIMIT
        );
    }

    if config.search.candidate_k < 1 {
        bail!("search.candidate_k must be >= 1");
    }

    if config.workers.max_blocking == 0 {
        bail!("workers.max_blocking must be > 0");
    }

    if let Some(mail) = &config.mail {
        if mail.smtp_host.trim().is_empty() {
            bail!("mail.smtp_host must not be empty");
        }
        if mail.username.trim().is_empty() {
            bail!("mail.username must not be empty");
        }
    }

    config.rule_set()?;
    Ok(())
}
