//! Logic for loading configuration in to an object model
mod cors;
mod server;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use displaydoc::Display;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::RootSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use self::cors::Cors;
pub use self::server::Server;
pub(crate) use self::server::HEALTH_CHECK_PATH;
use crate::resolvers::LikeStrategy;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not read file '{path}': {error}
    CannotReadFile { path: String, error: std::io::Error },
    /// invalid seed document: {error}
    InvalidSeed { error: String },
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_yaml::Error),
}

/// The configuration of the feed API.
///
/// Every section is optional, an empty file yields an in-memory store served on
/// `127.0.0.1:4000`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Configuration options pertaining to the http server component.
    pub(crate) server: Server,

    /// Cross origin request headers.
    pub(crate) cors: Cors,

    /// The document store holding the `users` and `tweets` collections.
    pub(crate) store: StoreConfig,

    /// Mutation behavior.
    pub(crate) mutations: Mutations,
}

#[buildstructor::buildstructor]
impl Configuration {
    #[builder(visibility = "pub")]
    fn new(
        server: Option<Server>,
        cors: Option<Cors>,
        store: Option<StoreConfig>,
        mutations: Option<Mutations>,
    ) -> Result<Self, ConfigurationError> {
        let configuration = Self {
            server: server.unwrap_or_default(),
            cors: cors.unwrap_or_default(),
            store: store.unwrap_or_default(),
            mutations: mutations.unwrap_or_default(),
        };
        configuration.validate()
    }
}

impl Configuration {
    /// Reads a YAML configuration file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigurationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|error| ConfigurationError::CannotReadFile {
                path: path.display().to_string(),
                error,
            })?;
        contents.parse()
    }

    pub(crate) fn validate(self) -> Result<Self, ConfigurationError> {
        if !self.server.path.starts_with('/') {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "'server.path' must start with '/'",
                error: self.server.path,
            });
        }
        // route captures and wildcards are not allowed
        if self.server.path.contains([':', '*', '{', '}']) {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "'server.path' must not contain ':', '*', '{' or '}'",
                error: self.server.path,
            });
        }
        if self.server.health_check && self.server.path == server::HEALTH_CHECK_PATH {
            return Err(ConfigurationError::InvalidConfiguration {
                message: "'server.path' conflicts with the health check",
                error: self.server.path,
            });
        }
        if let StoreConfig::Firestore(firestore) = &self.store {
            if firestore.project_id.is_empty() {
                return Err(ConfigurationError::InvalidConfiguration {
                    message: "'store.project_id' must not be empty",
                    error: String::new(),
                });
            }
        }
        // Building the layer checks every origin.
        self.cors
            .clone()
            .into_layer()
            .map_err(|error| ConfigurationError::InvalidConfiguration {
                message: "invalid 'cors' configuration",
                error,
            })?;
        Ok(self)
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    pub fn like_strategy(&self) -> LikeStrategy {
        self.mutations.like_tweet
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // An empty file deserializes as a unit, not as an empty map.
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Configuration>(s)
            .map_err(ConfigurationError::DeserializeConfigError)?
            .validate()
    }
}

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> RootSchema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = false;
    });
    settings.into_generator().into_root_schema_for::<Configuration>()
}

/// Where documents are read from and written to.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// A process-local store, optionally seeded from a JSON fixture.
    Memory(MemoryConfig),
    /// Cloud Firestore, or its emulator, through the REST API.
    Firestore(FirestoreConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory(MemoryConfig::default())
    }
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Memory(_) => "memory",
            StoreConfig::Firestore(_) => "firestore",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct MemoryConfig {
    /// Path of a JSON file shaped as `{"users": {"<id>": {...}}, "tweets": {"<id>": {...}}}`.
    pub seed: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FirestoreConfig {
    /// The Google Cloud project id.
    pub project_id: String,

    /// The database id, defaults to `(default)`.
    #[serde(default = "default_database")]
    pub database: String,

    /// The API endpoint. Point it at the emulator for local development.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// The environment variable holding an OAuth2 access token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Timeout of every store call in human-readable format; defaults to 10s
    #[serde(
        deserialize_with = "humantime_serde::deserialize",
        serialize_with = "humantime_serde::serialize",
        default = "default_timeout"
    )]
    #[schemars(with = "String", default = "default_timeout_string")]
    pub timeout: Duration,
}

fn default_database() -> String {
    String::from("(default)")
}

fn default_endpoint() -> String {
    String::from("https://firestore.googleapis.com")
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_access_token_env() -> String {
    String::from("FIRESTORE_ACCESS_TOKEN")
}

fn default_timeout_string() -> String {
    String::from("10s")
}

/// Mutation configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Mutations {
    /// How `likeTweet` increments the counter.
    pub like_tweet: LikeStrategy,
}
