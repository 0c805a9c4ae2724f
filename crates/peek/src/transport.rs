use derive_more::{Display, Error, From};
use itertools::Itertools;
use reqwest::{
    blocking::{
        multipart::{Form, Part},
        Client,
    },
    StatusCode,
};
use serde::Deserialize;

use crate::{config::Credentials, payload::UploadPayload};

/// Header carrying the client version tag.
const CLIENT_VERSION_HEADER: &str = "X-FEATUREPEEK-CLIENT";

/// Value of the `service` form field, identifying uploads made by this client.
const UPLOAD_SOURCE: &str = "cli";

/// Errors returned by the preview API.
#[derive(Debug, Display, From, Error)]
pub(crate) enum TransportError {
    /// HTTP client error.
    #[display(fmt = "upload request failed")]
    Http(reqwest::Error),

    /// The service refused the upload.
    #[from(ignore)]
    #[display(fmt = "upload failed with status {}: {}", status, message)]
    Rejected {
        /// Response status code.
        status: StatusCode,

        /// Error messages reported by the service.
        message: String,
    },
}

impl TransportError {
    /// Remediation hint shown next to the error.
    pub(crate) fn hint(&self) -> Option<&'static str> {
        match self {
            TransportError::Rejected { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                Some("Your session may have expired. Run `peek login` and try again.")
            }
            TransportError::Http(_) => Some("Check your network connection and try again."),
            _ => None,
        }
    }
}

/// JSON error body returned by the preview API.
#[derive(Deserialize)]
struct ErrorResponse {
    /// List of error messages.
    #[serde(default)]
    errors: Vec<String>,

    /// Single error message.
    #[serde(default)]
    message: Option<String>,
}

/// Extract human-readable messages from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(response) if !response.errors.is_empty() => response.errors.iter().join("; "),
        Ok(ErrorResponse {
            message: Some(message),
            ..
        }) => message,
        _ if body.trim().is_empty() => String::from("no details provided"),
        _ => body.trim().to_owned(),
    }
}

/// Blocking client for the preview API.
pub(crate) struct PreviewClient {
    /// HTTP client.
    client: Client,

    /// Base API URL for the selected environment.
    api_url: String,

    /// Client version tag sent with every upload.
    version: &'static str,
}

impl PreviewClient {
    /// Create a new client for the provided API base URL.
    pub(crate) fn new(api_url: &str, version: &'static str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_owned(),
            version,
        }
    }

    /// Upload the payload and return the URL of the launched preview environment.
    pub(crate) fn submit(
        &self,
        payload: UploadPayload,
        credentials: &Credentials,
    ) -> Result<String, TransportError> {
        let UploadPayload {
            service_name,
            archive,
            org,
            repo,
            sha,
            branch,
            checksum,
        } = payload;

        let form = Form::new()
            .part(
                "artifacts",
                Part::bytes(archive)
                    .file_name("artifacts.zip")
                    .mime_str("application/zip")?,
            )
            .text("app", service_name)
            .text("service", UPLOAD_SOURCE)
            .text("org", org)
            .text("repo", repo)
            .text("sha", sha)
            .text("branch", branch)
            .text("checksum", checksum);

        let url = format!("{}/peek", self.api_url);
        tracing::debug!("uploading to {url}");

        let response = self
            .client
            .post(url)
            .bearer_auth(credentials.access_token())
            .header(CLIENT_VERSION_HEADER, self.version)
            .multipart(form)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        tracing::debug!("upload response status {status}");

        if status.is_success() {
            Ok(body.trim().to_owned())
        } else {
            Err(TransportError::Rejected {
                status,
                message: error_message(&body),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_list() {
        assert_eq!(
            error_message(r#"{"errors": ["sha not found", "repo not linked"]}"#),
            "sha not found; repo not linked"
        );
    }

    #[test]
    fn single_message() {
        assert_eq!(error_message(r#"{"message": "forbidden"}"#), "forbidden");
    }

    #[test]
    fn plain_body() {
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "no details provided");
    }

    #[test]
    fn unauthorized_hint() {
        let error = TransportError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: String::new(),
        };

        assert!(error.hint().unwrap().contains("peek login"));
    }
}
