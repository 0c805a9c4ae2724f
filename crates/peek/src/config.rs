use std::{fs, io, path::PathBuf};

use common::config::{config_dir, Environment};
use derive_more::{Display, Error, From};
use figment::{
    error::Kind,
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Credentials configuration errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum CredentialsError {
    /// Unable to load the credentials using [`figment`].
    #[display(fmt = "unable to load credentials")]
    Figment(figment::Error),

    /// IO-related error.
    #[display(fmt = "unable to access the credentials file")]
    Io(io::Error),

    /// Unable to serialize the credentials using [`toml`] crate.
    #[display(fmt = "unable to serialize credentials")]
    Toml(toml::ser::Error),

    /// User's home directory cannot be determined.
    #[from(ignore)]
    #[display(fmt = "unable to find home directory")]
    HomeDirNotFound,

    /// No stored credentials.
    #[from(ignore)]
    #[display(fmt = "no credentials found")]
    NotLoggedIn,
}

impl CredentialsError {
    /// Remediation hint shown next to the error.
    pub(crate) fn hint(&self) -> Option<&'static str> {
        match self {
            CredentialsError::NotLoggedIn => {
                Some("Run `peek login` to log in with your account.")
            }
            CredentialsError::Figment(_) => {
                Some("Run `peek logout` and `peek login` to refresh stored credentials.")
            }
            _ => None,
        }
    }
}

/// Stored OAuth tokens.
#[derive(Serialize, Deserialize)]
pub(crate) struct Credentials {
    /// Bearer token sent with every API request.
    access_token: String,

    /// Token used to obtain a new access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,

    /// OpenID identity token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,

    /// Access token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    token_type: String,

    /// Access token lifetime, in seconds.
    #[serde(default)]
    expires_in: u64,
}

/// Token type assumed when the authorization server omits it.
fn default_token_type() -> String {
    String::from("Bearer")
}

impl Credentials {
    /// Load stored credentials for the selected environment.
    ///
    /// `PEEK_AUTH_`-prefixed environment variables override file values, so
    /// `PEEK_AUTH_ACCESS_TOKEN` alone is enough to authenticate in CI.
    ///
    /// Returns [`CredentialsError::NotLoggedIn`] when no access token is available.
    pub(crate) fn load(environment: Environment) -> Result<Self, CredentialsError> {
        let extracted = Figment::new()
            .merge(Toml::file(Self::path(environment)?))
            .merge(Env::prefixed("PEEK_AUTH_"))
            .extract();

        match extracted {
            Ok(credentials) => Ok(credentials),
            Err(error) if matches!(error.kind, Kind::MissingField(_)) => {
                Err(CredentialsError::NotLoggedIn)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Write the credentials to the default file location.
    pub(crate) fn save(&self, environment: Environment) -> Result<(), CredentialsError> {
        let path = Self::path(environment)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, toml::to_string(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Remove stored credentials. A missing file is not an error.
    pub(crate) fn remove(environment: Environment) -> Result<(), CredentialsError> {
        match fs::remove_file(Self::path(environment)?) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }

    /// Get access token from the current credentials.
    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Get credentials storage path.
    ///
    /// Returns [`Err`] if home directory cannot be determined.
    fn path(environment: Environment) -> Result<PathBuf, CredentialsError> {
        let dir = config_dir().ok_or(CredentialsError::HomeDirNotFound)?;

        Ok(dir.join(match environment {
            Environment::Production => "credentials.toml",
            Environment::Development => "dev-credentials.toml",
        }))
    }
}

/// Token endpoint response, as returned by the authorization server.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    /// Bearer access token.
    access_token: String,

    /// Refresh token, present when `offline_access` was requested.
    #[serde(default)]
    refresh_token: Option<String>,

    /// OpenID identity token.
    #[serde(default)]
    id_token: Option<String>,

    /// Access token type.
    #[serde(default = "default_token_type")]
    token_type: String,

    /// Access token lifetime, in seconds.
    #[serde(default)]
    expires_in: u64,
}

impl From<TokenResponse> for Credentials {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
        }
    }
}
