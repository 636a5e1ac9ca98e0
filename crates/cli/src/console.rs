// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use console sign-in URLs from temporary keys.

use anyhow::Context;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::issuer::Keys;

/// Where the console lands after sign-in.
pub const CONSOLE_DESTINATION: &str = "https://console.aws.amazon.com/";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload<'a> {
    session_id: &'a str,
    session_key: &'a str,
    session_token: &'a str,
}

#[derive(Deserialize)]
struct FederationResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Trade `keys` for a sign-in token, then build the login URL.
pub async fn signin_url(
    http: &reqwest::Client,
    federation_endpoint: &str,
    keys: &Keys,
) -> anyhow::Result<Url> {
    let session = serde_json::to_string(&SessionPayload {
        session_id: &keys.access_key_id,
        session_key: &keys.secret_access_key,
        session_token: &keys.session_token,
    })
    .context("cant marshal keys")?;

    let resp = http
        .get(federation_endpoint)
        .query(&[("Action", "getSigninToken"), ("SessionType", "json"), ("Session", session.as_str())])
        .send()
        .await
        .context("failed to get federation response")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("federation endpoint returned {status}: {body}");
    }

    let fed: FederationResponse =
        resp.json().await.context("cant unmarshal federation response body")?;
    login_url(federation_endpoint, &fed.signin_token)
}

/// The login URL for a sign-in token.
pub fn login_url(federation_endpoint: &str, signin_token: &str) -> anyhow::Result<Url> {
    Url::parse_with_params(
        federation_endpoint,
        &[("Action", "login"), ("Destination", CONSOLE_DESTINATION), ("SigninToken", signin_token)],
    )
    .context("cant parse sign in url")
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
