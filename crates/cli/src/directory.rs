// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account/role directory and its cache.
//!
//! The profile cache has no TTL: it is rebuilt when it is missing or empty,
//! or when a refresh is forced. Rebuilding pages through the account list
//! and spawns one task per account to page through that account's roles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache;
use crate::resolve::slugify;
use crate::sso::portal::{next_page, PortalClient};

/// One account and the role names assigned to the caller in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Slug")]
    pub slug: String,
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(default, alias = "Roles", deserialize_with = "null_as_empty")]
    pub roles: Vec<String>,
}

/// The persisted unit of the profile cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(default, alias = "Accounts", deserialize_with = "null_as_empty")]
    pub accounts: Vec<Account>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ProfileSet {
    /// Load the cache at `path`; absent means empty.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(cache::read_json(path)?.map(|(_, set)| set).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        cache::write_json(path, self)
            .with_context(|| format!("cannot write profile cache {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Strip rules applied to account names when deriving slugs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugRules {
    pub prefix: String,
    pub suffix: String,
}

pub struct ProfileDirectory {
    path: PathBuf,
    portal: PortalClient,
    slugs: SlugRules,
}

impl ProfileDirectory {
    pub fn new(path: impl Into<PathBuf>, portal: PortalClient, slugs: SlugRules) -> Self {
        Self { path: path.into(), portal, slugs }
    }

    pub fn cache_path(&self) -> &Path {
        &self.path
    }

    /// Return the cached profile set, rebuilding it when empty or forced.
    pub async fn get_profiles(&self, token: &str, force_refresh: bool) -> anyhow::Result<ProfileSet> {
        if token.is_empty() {
            anyhow::bail!("invalid token");
        }
        if force_refresh {
            cache::purge(&self.path)?;
        }

        let cached = ProfileSet::load(&self.path)
            .with_context(|| format!("cannot get profile cache {}", self.path.display()))?;
        if !cached.is_empty() {
            debug!(accounts = cached.accounts.len(), "using cached profiles");
            return Ok(cached);
        }

        let set = self.create(token).await.context("cannot get accounts or roles")?;
        if set.is_empty() {
            warn!("directory returned no accounts");
        }
        set.save(&self.path)?;
        Ok(set)
    }

    /// Enumerate every account and its roles from the portal.
    ///
    /// A failure listing accounts aborts the whole enumeration. A failure
    /// listing one account's roles only truncates that account's roles.
    /// Accounts come back in completion order.
    pub async fn create(&self, token: &str) -> anyhow::Result<ProfileSet> {
        let token: Arc<str> = Arc::from(token);
        let (tx, mut rx) = mpsc::channel::<Account>(1);
        // Dropping the set aborts role tasks left over from a failed listing.
        let mut tasks = JoinSet::new();

        let mut next: Option<String> = None;
        loop {
            let page = self
                .portal
                .list_accounts(&token, next.as_deref())
                .await
                .context("cannot list accounts")?;

            for info in page.account_list {
                let Some(name) = info.account_name else {
                    warn!("nil account name, skipping");
                    continue;
                };
                let Some(id) = info.account_id else {
                    warn!(account = %name, "nil account id, skipping");
                    continue;
                };

                let account = Account { name, id, ..Account::default() };
                tasks.spawn(enumerate_roles(
                    self.portal.clone(),
                    Arc::clone(&token),
                    account,
                    tx.clone(),
                ));
            }

            match next_page(page.next_token) {
                Some(t) => next = Some(t),
                None => break,
            }
        }
        // The channel closes once every task has dropped its sender.
        drop(tx);

        let spawned = tasks.len();
        let mut accounts = Vec::with_capacity(spawned);
        while let Some(mut account) = rx.recv().await {
            account.slug = slugify(&account.name, &self.slugs.prefix, &self.slugs.suffix);
            accounts.push(account);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("role task failed: {e}");
            }
        }
        if accounts.len() != spawned {
            warn!(spawned, collected = accounts.len(), "some account tasks did not report");
        }
        info!(accounts = accounts.len(), "profiles refreshed");
        Ok(ProfileSet { accounts })
    }
}

async fn enumerate_roles(
    portal: PortalClient,
    token: Arc<str>,
    mut account: Account,
    tx: mpsc::Sender<Account>,
) {
    let mut next: Option<String> = None;
    loop {
        let page = match portal.list_account_roles(&token, &account.id, next.as_deref()).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    account_id = %account.id,
                    error = %e,
                    "error getting next page of roles, all roles may not be available"
                );
                break;
            }
        };

        for role in page.role_list {
            match role.role_name {
                Some(name) => account.roles.push(name),
                None => warn!(account_id = %account.id, "nil role name, skipping"),
            }
        }

        match next_page(page.next_token) {
            Some(t) => next = Some(t),
            None => break,
        }
    }

    if tx.send(account).await.is_err() {
        debug!("profile collector gone, dropping account");
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
