//! Database credentials configuration
//!
//! One credentials file per deployment environment:
//!
//! ```json
//! {
//!   "username": "app",
//!   "password": "secret",
//!   "database_settings": {
//!     "shard_a": {
//!       "primary": { "host": "10.0.0.1", "port": 3306 },
//!       "replica": { "host": "10.0.0.2", "port": 3306 }
//!     }
//!   }
//! }
//! ```
//!
//! `master` and `slave` are accepted as aliases for `primary` and `replica`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigResult};
use crate::connection::ReplicaRole;

/// Deployment environment, selecting the credentials file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Prod,
    Stg,
    #[default]
    Dev,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Stg => "stg",
            Environment::Dev => "dev",
        }
    }

    /// File name of the credentials config for this environment
    pub fn credentials_file(&self) -> &'static str {
        match self {
            Environment::Prod => "mysql.prod.json",
            Environment::Stg => "mysql.stg.json",
            Environment::Dev => "mysql.dev.json",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "stg" | "staging" => Ok(Environment::Stg),
            "dev" | "development" => Ok(Environment::Dev),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host and port of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Endpoints of one logical database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(alias = "master")]
    pub primary: Endpoint,
    #[serde(alias = "slave")]
    pub replica: Endpoint,
}

impl DatabaseSettings {
    /// Returns the endpoint serving the given role
    pub fn endpoint(&self, role: ReplicaRole) -> &Endpoint {
        match role {
            ReplicaRole::Primary => &self.primary,
            ReplicaRole::Replica => &self.replica,
        }
    }
}

/// Credentials and database endpoints for one environment
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    pub username: String,
    pub password: String,
    pub database_settings: BTreeMap<String, DatabaseSettings>,
}

impl DbConfig {
    /// Loads and validates a credentials file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(&origin, e))?;
        Self::from_json_str(&content, &origin)
    }

    /// Loads `<settings_dir>/mysql.<env>.json`
    pub fn load_for(settings_dir: &Path, env: Environment) -> ConfigResult<Self> {
        Self::load(&settings_dir.join(env.credentials_file()))
    }

    /// Parses and validates credentials from a JSON string
    pub fn from_json_str(content: &str, origin: &str) -> ConfigResult<Self> {
        let config: DbConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::parse(origin, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.username.is_empty() {
            return Err(ConfigError::InvalidCredentials("username is empty".into()));
        }
        if self.database_settings.is_empty() {
            return Err(ConfigError::InvalidCredentials(
                "database_settings declares no database".into(),
            ));
        }
        for (db, settings) in &self.database_settings {
            for role in [ReplicaRole::Primary, ReplicaRole::Replica] {
                if settings.endpoint(role).host.is_empty() {
                    return Err(ConfigError::InvalidCredentials(format!(
                        "database '{}' has an empty {} host",
                        db, role
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns the settings for a database
    pub fn settings(&self, db_name: &str) -> Option<&DatabaseSettings> {
        self.database_settings.get(db_name)
    }

    /// Returns the endpoint for a database and role
    pub fn endpoint(&self, db_name: &str, role: ReplicaRole) -> Option<&Endpoint> {
        self.settings(db_name).map(|s| s.endpoint(role))
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("database_settings", &self.database_settings)
            .finish()
    }
}
