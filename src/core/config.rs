//! Connection configuration and `.ccshare` team descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where `init` writes the connection config
pub const DEFAULT_CONFIG_PATH: &str = "config/default_config.yaml";

/// Where the `.ccshare` commands read and write
pub const DEFAULT_CCSHARE_PATH: &str = "config/team.ccshare";

pub const DEFAULT_DB_NAME: &str = "contextchain_db";

/// Environment variable overriding the configured URI
pub const ENV_DB_URI: &str = "CONTEXTCHAIN_DB_URI";

/// Environment variable overriding the configured database name
pub const ENV_DB_NAME: &str = "CONTEXTCHAIN_DB_NAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration at {0}; run `contextchain init` first")]
    Missing(PathBuf),

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid YAML in {path}: {source}")]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Connection URI (e.g. `sqlite:///var/lib/contextchain`)
    pub uri: String,

    /// Database name within the URI's location
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// The `.ccshare` file this config was derived from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccshare_path: Option<String>,
}

fn default_db_name() -> String {
    DEFAULT_DB_NAME.to_string()
}

/// Default connection URI under the local data directory
pub fn default_uri() -> String {
    let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    format!("sqlite://{}", data_dir.join("contextchain").display())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            db_name: default_db_name(),
            ccshare_path: None,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            // Environment alone is enough to connect
            if let Ok(uri) = std::env::var(ENV_DB_URI) {
                let mut config = Self {
                    uri,
                    ..Self::default()
                };
                config.apply_env();
                return Ok(config);
            }
            return Err(ConfigError::Missing(path.to_path_buf()));
        }

        let mut config: AppConfig = read_yaml(path)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    fn apply_env(&mut self) {
        if let Ok(uri) = std::env::var(ENV_DB_URI) {
            self.uri = uri;
        }
        if let Ok(name) = std::env::var(ENV_DB_NAME) {
            self.db_name = name;
        }
    }

    /// Build a config from a team descriptor
    pub fn from_ccshare(share: &CcShare, ccshare_path: &Path) -> Self {
        Self {
            uri: share.uri.clone(),
            db_name: share.db_name.clone(),
            ccshare_path: Some(ccshare_path.display().to_string()),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_yaml(path.as_ref(), self)
    }
}

/// Access level granted to a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "readOnly")]
    ReadOnly,
    #[serde(rename = "readWrite")]
    ReadWrite,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::ReadOnly, Role::ReadWrite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ReadOnly => "readOnly",
            Role::ReadWrite => "readWrite",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub user: String,
    pub role: Role,
}

/// Shared database descriptor for team collaboration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcShare {
    pub uri: String,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default)]
    pub roles: Vec<RoleGrant>,
}

impl CcShare {
    pub fn new(uri: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            db_name: db_name.into(),
            roles: Vec::new(),
        }
    }

    pub fn add_role(&mut self, user: impl Into<String>, role: Role) {
        self.roles.push(RoleGrant {
            user: user.into(),
            role,
        });
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        read_yaml(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_yaml(path.as_ref(), self)
    }

    /// Roles formatted as `user:role` pairs
    pub fn roles_summary(&self) -> String {
        if self.roles.is_empty() {
            return "(none)".to_string();
        }
        self.roles
            .iter()
            .map(|g| format!("{}:{}", g.user, g.role))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::InvalidYaml {
        path: path.to_path_buf(),
        source,
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let content = serde_yaml::to_string(value)?;
    std::fs::write(path, content).map_err(io_err)
}
