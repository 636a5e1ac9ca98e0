// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OIDC device authorization (RFC 8628) against the identity provider.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode, SsoError};

/// Grant type for exchanging a device code.
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// A freshly registered public client. Never cached.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub client_secret_expires_at: Option<i64>,
}

/// Response of `StartDeviceAuthorization`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthorization {
    pub device_code: String,
    #[serde(default)]
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub interval: u64,
}

impl DeviceAuthorization {
    /// The URL to show the user, preferring the one with the code embedded.
    pub fn verification_url(&self) -> &str {
        self.verification_uri_complete.as_deref().unwrap_or(&self.verification_uri)
    }
}

/// Response of `CreateToken`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientRequest<'a> {
    client_name: &'a str,
    client_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartDeviceAuthorizationRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    start_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    device_code: &'a str,
}

#[derive(Debug, Clone)]
pub struct OidcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl OidcClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        Self { http, endpoint }
    }

    /// Register a public client under `client_name`.
    pub async fn register_client(&self, client_name: &str) -> Result<ClientRegistration, SsoError> {
        debug!(endpoint = %self.endpoint, "registering oidc client");
        let resp = self
            .http
            .post(format!("{}/client/register", self.endpoint))
            .json(&RegisterClientRequest { client_name, client_type: "public" })
            .send()
            .await?;
        decode(resp).await
    }

    /// Start device authorization for the portal at `start_url`.
    pub async fn start_device_authorization(
        &self,
        client: &ClientRegistration,
        start_url: &str,
    ) -> Result<DeviceAuthorization, SsoError> {
        let resp = self
            .http
            .post(format!("{}/device_authorization", self.endpoint))
            .json(&StartDeviceAuthorizationRequest {
                client_id: &client.client_id,
                client_secret: &client.client_secret,
                start_url,
            })
            .send()
            .await?;
        decode(resp).await
    }

    /// Exchange an approved device code for an access token.
    pub async fn create_token(
        &self,
        client: &ClientRegistration,
        device_code: &str,
    ) -> Result<TokenResponse, SsoError> {
        let resp = self
            .http
            .post(format!("{}/token", self.endpoint))
            .json(&CreateTokenRequest {
                client_id: &client.client_id,
                client_secret: &client.client_secret,
                grant_type: DEVICE_CODE_GRANT,
                device_code,
            })
            .send()
            .await?;
        decode(resp).await
    }
}
