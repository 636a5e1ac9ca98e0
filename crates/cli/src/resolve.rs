// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile names and their resolution.
//!
//! A profile name is `<account slug>-<role>`, where the role has the
//! configured role prefix removed and the joined name has the role suffix
//! removed. A user's choice resolves by exact name, then by nickname, then
//! by a substring that matches exactly one name.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::directory::ProfileSet;

/// Lowercase `name`, turn spaces into hyphens, then strip `prefix` and
/// `suffix` once each.
pub fn slugify(name: &str, prefix: &str, suffix: &str) -> String {
    let slug = name.to_lowercase().replace(' ', "-");
    let slug = slug.strip_prefix(prefix).unwrap_or(&slug);
    slug.strip_suffix(suffix).unwrap_or(slug).to_owned()
}

/// Strip rules applied to role names when building profile names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRules {
    pub prefix: String,
    pub suffix: String,
}

impl RoleRules {
    /// Profile name for `role` in the account with `slug`.
    pub fn profile_name(&self, slug: &str, role: &str) -> String {
        let role = role.strip_prefix(self.prefix.as_str()).unwrap_or(role);
        let joined = format!("{slug}-{role}");
        joined.strip_suffix(self.suffix.as_str()).unwrap_or(&joined).to_owned()
    }
}

/// The account and role behind a profile name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub account_id: String,
    pub role_name: String,
}

/// Profile name → badge, rebuilt on every run.
#[derive(Debug, Clone, Default)]
pub struct BadgeIndex {
    badges: BTreeMap<String, Badge>,
}

impl BadgeIndex {
    /// Index every (account, role) pair. When two pairs derive the same name
    /// the later one wins and a warning is logged.
    pub fn build(profiles: &ProfileSet, rules: &RoleRules) -> Self {
        let mut badges = BTreeMap::new();
        for account in &profiles.accounts {
            for role in &account.roles {
                let name = rules.profile_name(&account.slug, role);
                let badge = Badge { account_id: account.id.clone(), role_name: role.clone() };
                if let Some(previous) = badges.insert(name.clone(), badge) {
                    warn!(
                        profile = %name,
                        replaced_account = %previous.account_id,
                        replaced_role = %previous.role_name,
                        account = %account.id,
                        role = %role,
                        "profile name collision, keeping the later binding"
                    );
                }
            }
        }
        Self { badges }
    }

    pub fn get(&self, name: &str) -> Option<&Badge> {
        self.badges.get(name)
    }

    /// All profile names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.badges.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }
}

/// Outcome of resolving a user's choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Selected {
        name: String,
        badge: Badge,
        /// The choice was a nickname.
        via_nick: bool,
        /// The name was reached by unique substring match.
        fuzzy: bool,
    },
    /// Nothing was asked for; the caller lists what is available.
    NoChoice { available: Vec<String> },
    Ambiguous { choice: String, available: Vec<String>, matches: Vec<String> },
    NoMatch { choice: String, available: Vec<String> },
}

/// Resolve `choice` against `index`. `nicks` is `None` when nicknames are
/// disabled.
pub fn resolve(
    index: &BadgeIndex,
    choice: &str,
    nicks: Option<&HashMap<String, String>>,
) -> Resolution {
    let (choice, via_nick) = match nicks.and_then(|n| n.get(choice)) {
        Some(target) => (target.as_str(), true),
        None => (choice, false),
    };

    if let Some(badge) = index.get(choice) {
        return Resolution::Selected {
            name: choice.to_owned(),
            badge: badge.clone(),
            via_nick,
            fuzzy: false,
        };
    }

    let matches: Vec<String> =
        index.badges.keys().filter(|name| name.contains(choice)).cloned().collect();

    if let [only] = matches.as_slice() {
        if let Some(badge) = index.get(only) {
            return Resolution::Selected {
                name: only.clone(),
                badge: badge.clone(),
                via_nick,
                fuzzy: true,
            };
        }
    }

    let available = index.names();
    if choice.is_empty() {
        Resolution::NoChoice { available }
    } else if matches.len() > 1 {
        Resolution::Ambiguous { choice: choice.to_owned(), available, matches }
    } else {
        Resolution::NoMatch { choice: choice.to_owned(), available }
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
