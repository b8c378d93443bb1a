//! Workspace configuration.
//!
//! # Responsibility
//! - Locate and parse the optional YAML configuration file.
//! - Build the immutable codec and rule engine used by a resolution.
//!
//! # Invariants
//! - A missing configuration file yields defaults.
//! - A malformed configuration file is an error, never silently ignored.

use crate::logging::default_log_level;
use crate::model::ipn::{IpnCodec, IpnError, DEFAULT_OWNED_CATEGORIES, DEFAULT_SUB_BOM_CATEGORIES};
use crate::service::rule_engine::{RuleEngine, ZeroQuantityPolicy};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const WORKSPACE_CONFIG_NAMES: &[&str] = &[
    "partline.yaml",
    "partline.yml",
    ".partline.yaml",
    ".partline.yml",
];
const HOME_CONFIG_NAMES: &[&str] = &[".partline.yaml", ".partline.yml"];

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    InvalidCategories(IpnError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "invalid configuration {}: {source}", path.display())
            }
            Self::InvalidCategories(err) => write!(f, "invalid category configuration: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidCategories(err) => Some(err),
        }
    }
}

impl From<IpnError> for ConfigError {
    fn from(value: IpnError) -> Self {
        Self::InvalidCategories(value)
    }
}

/// Settings read from `partline.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartlineConfig {
    /// Directory holding partmaster CSV files; relative paths resolve
    /// against the directory of the configuration file.
    #[serde(alias = "pmDir")]
    pub pm_dir: Option<PathBuf>,
    pub owned_categories: Vec<String>,
    pub sub_bom_categories: Vec<String>,
    pub zero_quantity: ZeroQuantityPolicy,
    pub log_level: String,
}

impl Default for PartlineConfig {
    fn default() -> Self {
        Self {
            pm_dir: None,
            owned_categories: to_owned_list(DEFAULT_OWNED_CATEGORIES),
            sub_bom_categories: to_owned_list(DEFAULT_SUB_BOM_CATEGORIES),
            zero_quantity: ZeroQuantityPolicy::default(),
            log_level: default_log_level().to_string(),
        }
    }
}

impl PartlineConfig {
    /// Loads the first configuration file found for `cwd`, or defaults.
    ///
    /// Looks in `cwd` first, then in the user's home directory.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        match Self::find(cwd) {
            Some(path) => Self::load_file(&path),
            None => {
                debug!("event=config_load module=config status=ok source=defaults");
                Ok(Self::default())
            }
        }
    }

    /// Path of the configuration file `load` would read.
    pub fn find(cwd: &Path) -> Option<PathBuf> {
        let local = WORKSPACE_CONFIG_NAMES.iter().map(|name| cwd.join(name));
        let home = dirs::home_dir()
            .into_iter()
            .flat_map(|dir| HOME_CONFIG_NAMES.iter().map(move |name| dir.join(name)));
        local.chain(home).find(|path| path.is_file())
    }

    /// Parses one configuration file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(pm_dir) = config.pm_dir.as_mut() {
            if pm_dir.is_relative() {
                if let Some(parent) = path.parent() {
                    *pm_dir = parent.join(&*pm_dir);
                }
            }
        }
        config.codec()?;

        debug!(
            "event=config_load module=config status=ok source={}",
            path.display()
        );
        Ok(config)
    }

    /// Parses YAML text; an empty document yields defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Builds the identifier codec for the configured category sets.
    pub fn codec(&self) -> Result<IpnCodec, IpnError> {
        IpnCodec::new(&self.owned_categories, &self.sub_bom_categories)
    }

    pub fn rule_engine(&self) -> RuleEngine {
        RuleEngine::new(self.zero_quantity)
    }
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
