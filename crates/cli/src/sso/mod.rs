// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP clients for the identity provider (OIDC) and the SSO portal.
//!
//! Both services speak JSON over HTTPS. The portal authenticates with the
//! OIDC access token in the `x-amz-sso_bearer_token` header.

pub mod oidc;
pub mod portal;
pub mod retry;

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Default federation endpoint used to mint console sign-in tokens.
pub const FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";

/// Base URLs for the three remote services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub oidc: String,
    pub portal: String,
    pub federation: String,
}

impl Endpoints {
    pub fn for_region(region: &str) -> Self {
        Self {
            oidc: format!("https://oidc.{region}.amazonaws.com"),
            portal: format!("https://portal.sso.{region}.amazonaws.com"),
            federation: FEDERATION_ENDPOINT.to_owned(),
        }
    }
}

/// Build the shared HTTP client.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let client = reqwest::Client::builder()
        .user_agent(concat!("lash/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

/// Error body shared by the OIDC and portal services.
#[derive(Debug, Default, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Failure of a single remote call.
#[derive(Debug)]
pub enum SsoError {
    /// The request never produced a response.
    Transport(reqwest::Error),
    /// The service answered with a non-success status.
    Status { status: StatusCode, error: Option<String>, message: String },
    /// The response body did not decode.
    Decode(String),
}

impl SsoError {
    /// Whether the call may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode(_) => false,
        }
    }

    /// The service's error code (e.g. `authorization_pending`), if any.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            Self::Status { error, .. } => error.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for SsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "request failed: {e}"),
            Self::Status { status, error: Some(code), message } if !message.is_empty() => {
                write!(f, "HTTP {status}: {code}: {message}")
            }
            Self::Status { status, error: Some(code), .. } => write!(f, "HTTP {status}: {code}"),
            Self::Status { status, message, .. } => write!(f, "HTTP {status}: {message}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for SsoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SsoError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

/// Turn a response into `T`, or into an [`SsoError::Status`] carrying the
/// service's error code and description.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, SsoError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let parsed: ServiceErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.error_description.or(parsed.message).unwrap_or(body);
        return Err(SsoError::Status { status, error: parsed.error, message });
    }

    serde_json::from_str(&body).map_err(|e| SsoError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
