//! Crawler configuration, optionally stored as `crawler.toml` next to the manifest.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Conventional config file name looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "crawler.toml";

/// Crawler configuration (TOML).
///
/// Missing fields default to the Node.js ecosystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Wall-clock budget for each checked script, in seconds.
    pub child_timeout_secs: u64,

    /// Dependency installs allowed after the first pass before giving up.
    pub max_retries: u32,

    /// Maximum number of scripts checked at once.
    pub concurrency: usize,

    /// Interpreter command; the script path is appended as the last argument.
    pub interpreter: Vec<String>,

    /// File extensions (without the dot) that mark a runnable script.
    pub script_extensions: Vec<String>,

    /// Directory name of the package manager's dependency cache.
    pub dependency_dir: String,

    /// File name of the dependency manifest.
    pub manifest_file: String,

    /// Wall-clock budget for each package manager command, in seconds.
    pub install_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Base URL of the package registry used by the freshness pass.
    pub registry_url: String,

    /// Per-request timeout for registry lookups, in seconds.
    pub registry_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            child_timeout_secs: 10,
            max_retries: 2,
            concurrency: 4,
            interpreter: vec!["node".to_string()],
            script_extensions: vec!["js".to_string()],
            dependency_dir: "node_modules".to_string(),
            manifest_file: "package.json".to_string(),
            install_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            registry_url: "https://registry.npmjs.org".to_string(),
            registry_timeout_secs: 10,
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.child_timeout_secs == 0 {
            return Err(anyhow!("child_timeout_secs must be > 0"));
        }
        if self.install_timeout_secs == 0 {
            return Err(anyhow!("install_timeout_secs must be > 0"));
        }
        if self.registry_timeout_secs == 0 {
            return Err(anyhow!("registry_timeout_secs must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(anyhow!("concurrency must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.interpreter.is_empty() || self.interpreter[0].trim().is_empty() {
            return Err(anyhow!("interpreter must be a non-empty array"));
        }
        if self.script_extensions.is_empty()
            || self.script_extensions.iter().any(|ext| ext.trim().is_empty())
        {
            return Err(anyhow!("script_extensions must list non-empty extensions"));
        }
        if self.dependency_dir.trim().is_empty() {
            return Err(anyhow!("dependency_dir must be non-empty"));
        }
        if self.manifest_file.trim().is_empty() {
            return Err(anyhow!("manifest_file must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrawlerConfig::default()`.
pub fn load_config(path: &Path) -> Result<CrawlerConfig> {
    if !path.exists() {
        let cfg = CrawlerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CrawlerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub child_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
}

impl CrawlerConfig {
    /// Apply `overrides` on top of `self` and re-validate.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(secs) = overrides.child_timeout_secs {
            self.child_timeout_secs = secs;
        }
        if let Some(retries) = overrides.max_retries {
            self.max_retries = retries;
        }
        if let Some(jobs) = overrides.concurrency {
            self.concurrency = jobs;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Settings for one crawl invocation. Built once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Absolute path to the file or directory being crawled.
    pub root: PathBuf,
    /// Echo child output and run the freshness pass.
    pub verbose: bool,
    /// Install missing modules and apply upgrades automatically.
    pub force: bool,
    pub settings: CrawlerConfig,
}

impl RunConfiguration {
    /// Resolve `root` to an absolute path and validate `settings`.
    ///
    /// The root is not required to exist here; the orchestrator inspects it
    /// before any work starts.
    pub fn new(root: &Path, verbose: bool, force: bool, settings: CrawlerConfig) -> Result<Self> {
        settings.validate()?;
        let root = std::path::absolute(root)
            .with_context(|| format!("resolve path {}", root.display()))?;
        Ok(Self {
            root,
            verbose,
            force,
            settings,
        })
    }

    pub fn child_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.child_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.install_timeout_secs)
    }

    pub fn max_retries(&self) -> u32 {
        self.settings.max_retries
    }

    /// Directory holding the manifest and dependency cache: the root itself,
    /// or the parent of a single-file root.
    pub fn project_dir(&self) -> PathBuf {
        if self.root.is_file() {
            self.root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone())
        } else {
            self.root.clone()
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir().join(&self.settings.manifest_file)
    }

    pub fn dependency_dir(&self) -> PathBuf {
        self.project_dir().join(&self.settings.dependency_dir)
    }
}
