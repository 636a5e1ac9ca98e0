// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OIDC access token: cache plus device-authorization flow.
//!
//! The cached token expires `expiresIn` seconds after the cache file was last
//! written. An expired token is treated as empty, never deleted; the next
//! successful flow overwrites it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache;
use crate::sso::oidc::{DeviceAuthorization, OidcClient};

/// Client name registered with the identity provider.
pub const CLIENT_NAME: &str = "lash";

/// Blocks until the user has approved the device authorization out of band.
pub type ConfirmFn = Arc<dyn Fn(&DeviceAuthorization) -> anyhow::Result<()> + Send + Sync>;

/// The OIDC bearer token and its lifetime.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(default, alias = "Value")]
    pub value: String,
    #[serde(default, rename = "expiresIn", alias = "ExpiresIn")]
    pub expires_in: u64,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("path", &self.path)
            .field("value", &if self.value.is_empty() { "" } else { "<redacted>" })
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl Token {
    /// Read the cached token at `path`, clearing its value if expired.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_at(path, SystemTime::now())
    }

    /// [`Token::load`] with an explicit notion of "now".
    pub fn load_at(path: &Path, now: SystemTime) -> anyhow::Result<Self> {
        let Some((modified, mut token)) = cache::read_json::<Token>(path)? else {
            return Ok(Self { path: path.to_path_buf(), ..Self::default() });
        };
        token.path = path.to_path_buf();

        // A lifetime past the end of representable time never expires.
        let expires_at = modified.checked_add(Duration::from_secs(token.expires_in));
        if expires_at.is_some_and(|at| now > at) {
            debug!(path = %path.display(), "cached oidc token expired");
            token.value.clear();
        }
        Ok(token)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        cache::write_json(&self.path, self)
            .with_context(|| format!("cannot write token cache {}", self.path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

pub struct TokenManager {
    path: PathBuf,
    oidc: OidcClient,
    start_url: String,
    confirm: ConfirmFn,
}

impl TokenManager {
    pub fn new(
        path: impl Into<PathBuf>,
        oidc: OidcClient,
        start_url: impl Into<String>,
        confirm: ConfirmFn,
    ) -> Self {
        Self { path: path.into(), oidc, start_url: start_url.into(), confirm }
    }

    pub fn cache_path(&self) -> &Path {
        &self.path
    }

    /// Return a usable token, running device authorization only when the
    /// cache is absent, expired, or purged by `force_refresh`.
    pub async fn get_token(&self, force_refresh: bool) -> anyhow::Result<Token> {
        if force_refresh {
            cache::purge(&self.path)?;
        }

        let token = Token::load(&self.path).context("cannot get oidc token")?;
        if !token.is_empty() {
            debug!("using cached oidc token");
            return Ok(token);
        }

        let token = self
            .acquire()
            .await
            .with_context(|| format!("cannot create token cache file {}", self.path.display()))?;
        if token.is_empty() {
            anyhow::bail!("oidc token is empty after device authorization");
        }
        Ok(token)
    }

    /// Run the full device-authorization sequence and cache the result.
    async fn acquire(&self) -> anyhow::Result<Token> {
        let client =
            self.oidc.register_client(CLIENT_NAME).await.context("cannot register for oidc")?;

        let auth = self
            .oidc
            .start_device_authorization(&client, &self.start_url)
            .await
            .context("cannot start device auth")?;
        info!(url = auth.verification_url(), "device authorization started");

        let confirm = Arc::clone(&self.confirm);
        let pending = auth.clone();
        tokio::task::spawn_blocking(move || confirm(&pending))
            .await
            .context("confirmation task failed")?
            .context("device authorization was not confirmed")?;

        let resp = self
            .oidc
            .create_token(&client, &auth.device_code)
            .await
            .context("cannot create token")?;

        let value = resp.access_token.unwrap_or_default();
        if value.is_empty() {
            anyhow::bail!("token response carried no access token");
        }

        let token = Token { path: self.path.clone(), value, expires_in: resp.expires_in };
        token.save()?;
        info!(expires_in = token.expires_in, "oidc token cached");
        Ok(token)
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
