// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSO portal: account and role assignments, role credentials.

use serde::Deserialize;
use tracing::debug;

use super::retry::RetryPolicy;
use super::{decode, SsoError};

/// Header carrying the OIDC access token on portal calls.
pub const BEARER_HEADER: &str = "x-amz-sso_bearer_token";

/// Page size requested from the listing calls.
const PAGE_SIZE: &str = "100";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPage {
    #[serde(default)]
    pub account_list: Vec<AccountInfo>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePage {
    #[serde(default)]
    pub role_list: Vec<RoleInfo>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Temporary keys as returned by the portal; every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCredentials {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Expiry as milliseconds since the Unix epoch.
    #[serde(default)]
    pub expiration: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleCredentialsResponse {
    #[serde(default)]
    role_credentials: Option<RoleCredentials>,
}

/// Continuation token of a page, treating `""` as the end.
pub fn next_page(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[derive(Debug, Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl PortalClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, retry: RetryPolicy) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_owned();
        Self { http, endpoint, retry }
    }

    /// Fetch one page of the caller's accounts. Retried with backoff.
    pub async fn list_accounts(
        &self,
        token: &str,
        next_token: Option<&str>,
    ) -> Result<AccountPage, SsoError> {
        self.retry
            .run("list_accounts", || async move {
                let mut query = vec![("max_result", PAGE_SIZE)];
                if let Some(next) = next_token {
                    query.push(("next_token", next));
                }
                let resp = self
                    .http
                    .get(format!("{}/assignment/accounts", self.endpoint))
                    .header(BEARER_HEADER, token)
                    .query(&query)
                    .send()
                    .await?;
                decode(resp).await
            })
            .await
    }

    /// Fetch one page of the roles assigned in `account_id`. Retried with
    /// backoff.
    pub async fn list_account_roles(
        &self,
        token: &str,
        account_id: &str,
        next_token: Option<&str>,
    ) -> Result<RolePage, SsoError> {
        self.retry
            .run("list_account_roles", || async move {
                let mut query = vec![("account_id", account_id), ("max_result", PAGE_SIZE)];
                if let Some(next) = next_token {
                    query.push(("next_token", next));
                }
                let resp = self
                    .http
                    .get(format!("{}/assignment/roles", self.endpoint))
                    .header(BEARER_HEADER, token)
                    .query(&query)
                    .send()
                    .await?;
                decode(resp).await
            })
            .await
    }

    /// Exchange the access token for role credentials. Single attempt.
    pub async fn get_role_credentials(
        &self,
        token: &str,
        account_id: &str,
        role_name: &str,
    ) -> Result<RoleCredentials, SsoError> {
        debug!(account_id, role_name, "requesting role credentials");
        let resp = self
            .http
            .get(format!("{}/federation/credentials", self.endpoint))
            .header(BEARER_HEADER, token)
            .query(&[("account_id", account_id), ("role_name", role_name)])
            .send()
            .await?;
        let body: RoleCredentialsResponse = decode(resp).await?;
        Ok(body.role_credentials.unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "portal_tests.rs"]
mod tests;
