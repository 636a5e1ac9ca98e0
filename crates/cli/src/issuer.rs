// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-lived role credentials for a resolved profile.

use anyhow::Context;

use crate::resolve::Badge;
use crate::sso::portal::{PortalClient, RoleCredentials};

/// Temporary access keys. Held in memory only.
#[derive(Clone, PartialEq, Eq)]
pub struct Keys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Expiry as milliseconds since the Unix epoch.
    pub expiration: i64,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl TryFrom<RoleCredentials> for Keys {
    type Error = anyhow::Error;

    fn try_from(creds: RoleCredentials) -> Result<Self, Self::Error> {
        Ok(Self {
            access_key_id: creds.access_key_id.context("role credentials missing accessKeyId")?,
            secret_access_key: creds
                .secret_access_key
                .context("role credentials missing secretAccessKey")?,
            session_token: creds.session_token.context("role credentials missing sessionToken")?,
            expiration: creds.expiration.context("role credentials missing expiration")?,
        })
    }
}

pub struct CredentialIssuer {
    portal: PortalClient,
}

impl CredentialIssuer {
    pub fn new(portal: PortalClient) -> Self {
        Self { portal }
    }

    /// Exchange `token` for keys to `badge`'s role. No retries.
    pub async fn issue(&self, badge: &Badge, token: &str) -> anyhow::Result<Keys> {
        let creds = self
            .portal
            .get_role_credentials(token, &badge.account_id, &badge.role_name)
            .await
            .with_context(|| {
                format!("cannot get role credentials for {}/{}", badge.account_id, badge.role_name)
            })?;
        Keys::try_from(creds)
    }
}

#[cfg(test)]
#[path = "issuer_tests.rs"]
mod tests;
