use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

/// Directory, relative to the home directory, that holds client configuration and credentials.
const CONFIG_DIR: &str = ".config/peek";

/// Client configuration file name inside of [`config_dir`].
const CONFIG_FILE: &str = "config.toml";

/// Preview service environment the client talks to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    /// Hosted production environment.
    #[default]
    Production,

    /// Development environment, used while working on the service itself.
    Development,
}

impl Environment {
    /// Select an environment from the `--dev` flag value.
    pub fn from_dev_flag(dev: bool) -> Self {
        if dev {
            Environment::Development
        } else {
            Environment::Production
        }
    }
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
///
/// [`FromStr`]: std::str::FromStr
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Logging {
    /// Verbose logging enabled with `--debug`.
    pub fn debug() -> Self {
        Self {
            level: LevelFilter::DEBUG,
        }
    }
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
        }
    }
}

/// Endpoint values used as the lowest-priority configuration layer.
#[derive(Serialize)]
struct Defaults {
    api_url: &'static str,
    auth_url: &'static str,
    client_id: &'static str,
    audience: &'static str,
}

impl Defaults {
    fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Defaults {
                api_url: "https://api.featurepeek.com/api/v1",
                auth_url: "https://login.featurepeek.com",
                client_id: "oB2RkLUylDTrsSxVa6qdLR3DQMbdh9IR",
                audience: "http://api.featurepeek.com/api/v1/",
            },
            Environment::Development => Defaults {
                api_url: "https://api.dev.featurepeek.com/api/v1",
                auth_url: "https://featurepeek-dev.auth0.com",
                client_id: "XnNVx0nzQSJdY6ksPGTnnciuGOM8kXsT",
                audience: "http://api.dev.featurepeek.com/api/v1/",
            },
        }
    }
}

/// General client configuration.
#[derive(Deserialize)]
pub struct Config {
    /// Base URL of the preview API.
    pub api_url: String,

    /// Base URL of the OAuth authorization server.
    pub auth_url: String,

    /// OAuth client identifier used by the device flow.
    pub client_id: String,

    /// OAuth audience requested for access tokens.
    pub audience: String,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    /// Create new config using environment defaults, the configuration file and environment variables.
    ///
    /// When `path` is [`None`] the file is looked up in [`config_dir`] and may be missing.
    /// An explicitly provided `path` must exist.
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    pub fn new(path: Option<PathBuf>, environment: Environment) -> Result<Self, figment::Error> {
        let mut figment =
            Figment::from(Serialized::defaults(Defaults::for_environment(environment)));

        match path {
            Some(path) if !path.is_file() => {
                return Err(format!("config file {} does not exist", path.display()).into());
            }
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(dir) = config_dir() {
                    figment = figment.merge(Toml::file(dir.join(CONFIG_FILE)));
                }
            }
        }

        figment.merge(Env::prefixed("PEEK_").split("__")).extract()
    }
}

/// Directory where client configuration and credentials are stored.
///
/// Returns [`None`] if home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(CONFIG_DIR))
}
