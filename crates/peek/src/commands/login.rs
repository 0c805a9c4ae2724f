use std::{thread, time::Duration};

use common::config::{Config, Environment};
use derive_more::{Display, Error, From};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;

use crate::{
    config::{Credentials, CredentialsError, TokenResponse},
    progress::Spinner,
};

/// Grant type used while polling the token endpoint.
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Requested scope, `offline_access` asks for a refresh token.
const SCOPE: &str = "offline_access";

/// Polling interval used when the authorization server does not provide one.
const DEFAULT_INTERVAL: u64 = 5;

/// Interval increase requested by a `slow_down` response.
const SLOW_DOWN_STEP: u64 = 5;

/// `login` subcommand errors.
#[derive(Debug, Display, From, Error)]
pub(crate) enum LoginError {
    /// Credentials storage error.
    #[display(fmt = "unable to store credentials")]
    Credentials(CredentialsError),

    /// HTTP client error.
    #[display(fmt = "authorization request failed")]
    Http(reqwest::Error),

    /// Unable to parse an authorization server response.
    #[display(fmt = "unexpected authorization server response")]
    Json(serde_json::Error),

    /// Access token signature or claims were rejected.
    #[display(fmt = "access token verification failed")]
    Token(jsonwebtoken::errors::Error),

    /// None of the authorization server keys matches the access token.
    #[from(ignore)]
    #[display(fmt = "no signing key found for the access token")]
    UnknownSigningKey,

    /// Device authorization request was refused.
    #[from(ignore)]
    #[display(fmt = "authorization request failed with status {}: {}", status, body)]
    Refused {
        /// Response status code.
        status: StatusCode,

        /// Response body.
        body: String,
    },

    /// The user denied access or the device code expired.
    #[from(ignore)]
    #[display(fmt = "login failed: {}", _0)]
    Denied(#[error(not(source))] String),
}

/// Device authorization response.
#[derive(Deserialize)]
struct DeviceCodeResponse {
    /// Code used to poll for tokens.
    device_code: String,

    /// Code the user must see on the confirmation screen.
    user_code: String,

    /// Verification page.
    verification_uri: String,

    /// Verification page with the user code prefilled.
    #[serde(default)]
    verification_uri_complete: Option<String>,

    /// Polling interval, in seconds.
    #[serde(default = "default_interval")]
    interval: u64,
}

/// Polling interval assumed when the server omits it.
fn default_interval() -> u64 {
    DEFAULT_INTERVAL
}

/// Error body of the token endpoint.
#[derive(Deserialize)]
struct TokenErrorResponse {
    /// Error code.
    error: String,

    /// Human-readable description.
    #[serde(default)]
    error_description: Option<String>,
}

/// Result of a single token endpoint poll.
enum Poll {
    /// Tokens were issued.
    Issued(TokenResponse),

    /// User has not confirmed yet.
    Pending,

    /// Server asked to poll less frequently.
    SlowDown,
}

/// Interpret a token endpoint response.
fn poll_outcome(status: StatusCode, body: &str) -> Result<Poll, LoginError> {
    if status.is_success() {
        return Ok(Poll::Issued(serde_json::from_str(body)?));
    }

    let TokenErrorResponse {
        error,
        error_description,
    } = serde_json::from_str(body)?;

    match error.as_str() {
        "authorization_pending" => Ok(Poll::Pending),
        "slow_down" => Ok(Poll::SlowDown),
        _ => Err(LoginError::Denied(error_description.unwrap_or(error))),
    }
}

/// Check the access token signature against the authorization server keys.
///
/// The token must be signed with RS256 by the key named in its header, or by the
/// first key when the header names none, and must be issued for `audience`.
fn verify_access_token(token: &str, keys: &JwkSet, audience: &str) -> Result<(), LoginError> {
    let header = decode_header(token)?;

    let jwk = match header.kid.as_deref() {
        Some(kid) => keys.find(kid),
        None => keys.keys.first(),
    }
    .ok_or(LoginError::UnknownSigningKey)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);

    decode::<serde_json::Value>(token, &DecodingKey::from_jwk(jwk)?, &validation)?;

    Ok(())
}

/// Login flow entrypoint.
pub(crate) fn login(config: &Config, environment: Environment) -> Result<(), LoginError> {
    let client = Client::new();
    let auth_url = config.auth_url.trim_end_matches('/');

    let response = client
        .post(format!("{auth_url}/oauth/device/code"))
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("scope", SCOPE),
            ("audience", config.audience.as_str()),
        ])
        .send()?;

    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(LoginError::Refused { status, body });
    }

    let device: DeviceCodeResponse = serde_json::from_str(&body)?;

    let keys: JwkSet = client
        .get(format!("{auth_url}/.well-known/jwks.json"))
        .send()?
        .error_for_status()?
        .json()?;

    let verification_url = device
        .verification_uri_complete
        .as_deref()
        .unwrap_or(&device.verification_uri);

    println!("Confirm that your browser shows the following code: {}", device.user_code);
    println!("If the browser does not open, visit {verification_url}");

    if let Err(error) = open::that(verification_url) {
        tracing::debug!("unable to open browser: {error}");
    }

    let progress = Spinner::start("Logging in...");
    let mut interval = device.interval;

    let tokens = loop {
        thread::sleep(Duration::from_secs(interval));

        let response = client
            .post(format!("{auth_url}/oauth/token"))
            .form(&[
                ("client_id", config.client_id.as_str()),
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", device.device_code.as_str()),
            ])
            .send()?;

        let status = response.status();

        match poll_outcome(status, &response.text()?)? {
            Poll::Issued(tokens) => break tokens,
            Poll::Pending => {}
            Poll::SlowDown => {
                interval += SLOW_DOWN_STEP;
                tracing::debug!("polling interval raised to {interval}s");
            }
        }
    };

    let credentials = Credentials::from(tokens);
    verify_access_token(credentials.access_token(), &keys, &config.audience)?;
    credentials.save(environment)?;

    progress.stop("Logging in... done");
    println!("Logged in to FeaturePeek");

    Ok(())
}
