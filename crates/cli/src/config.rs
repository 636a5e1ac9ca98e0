// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::directory::SlugRules;
use crate::resolve::RoleRules;
use crate::sso::Endpoints;

/// Build version, stamped by build.rs from `git describe`.
pub const VERSION: &str = match option_env!("LASH_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

const AFTER_HELP: &str = "\
A profile is an account slug joined with a role name, e.g. the role \"admin\"
in the \"Data Dev\" account is \"data-dev-admin\". Any unique substring selects
a profile. With no profile, the available ones are listed.

Without a command the chosen keys are written to <dir>/credentials, wrapped by
the unmanaged <dir>/credentials-head and <dir>/credentials-tail files when they
exist. With a command the keys are exported to its environment instead.

Configuration lives in <dir>/lash/config.json:
  region, start_url                      required
  nicks                                  {\"lab\": \"project-lab-poweruser\"}
  strip_prefix, strip_suffix             trimmed from account slugs
  role_strip_prefix, role_strip_suffix   trimmed from role names

Exit codes: 1 init, 2 config, 3 setup, 4 cache/token/profiles, 5 role keys,
6 credentials file, 9 command, 11 no unique match, 12 console url, 64 usage.";

/// Less annoying SSO helper.
#[derive(Debug, Parser)]
#[command(name = "lash", version = VERSION, about, after_help = AFTER_HELP)]
pub struct Config {
    /// Directory holding the credentials file and the lash/ subdirectory.
    #[arg(short = 'd', long, env = "LASH_DIR")]
    pub dir: Option<PathBuf>,

    /// Ignore the nickname map from config.
    #[arg(short = 'n', long)]
    pub no_nicks: bool,

    /// Refresh the oidc token and the profiles.
    #[arg(short = 'r', long)]
    pub refresh: bool,

    /// Print a console sign-in url for the chosen profile.
    #[arg(short = 'u', long)]
    pub url: bool,

    /// Create the lash/ subdirectory and re-create config.json interactively.
    #[arg(long)]
    pub init: bool,

    /// Disable colored output.
    #[arg(long, env = "LASH_NO_COLOR")]
    pub no_color: bool,

    /// Log format (json or text).
    #[arg(long, env = "LASH_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LASH_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// A string which uniquely matches a profile.
    pub profile: Option<String>,

    /// Command to run with the keys in its environment.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Config {
    /// Validate flag combinations. Does not touch the filesystem.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if self.url && !self.command.is_empty() {
            anyhow::bail!("cannot specify both -u and a command");
        }
        Ok(())
    }

    /// The base directory, `~/.aws` unless overridden.
    pub fn basedir(&self) -> anyhow::Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let home = dirs::home_dir().context("cannot find home directory")?;
                Ok(home.join(".aws"))
            }
        }
    }

    /// The choice as typed, or empty.
    pub fn choice(&self) -> &str {
        self.profile.as_deref().unwrap_or_default()
    }
}

/// Contents of `<basedir>/lash/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub start_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_strip_prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_strip_suffix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strip_prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strip_suffix: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub nicks: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_endpoint: Option<String>,
}

impl FileConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.region.is_empty() {
            anyhow::bail!("config error: missing region");
        }
        if self.start_url.is_empty() {
            anyhow::bail!("config error: missing start_url");
        }
        Ok(())
    }

    /// Regional endpoints with any overrides from the file applied.
    pub fn endpoints(&self) -> Endpoints {
        let mut endpoints = Endpoints::for_region(&self.region);
        if let Some(ref url) = self.oidc_endpoint {
            endpoints.oidc = url.clone();
        }
        if let Some(ref url) = self.portal_endpoint {
            endpoints.portal = url.clone();
        }
        if let Some(ref url) = self.federation_endpoint {
            endpoints.federation = url.clone();
        }
        endpoints
    }

    pub fn slug_rules(&self) -> SlugRules {
        SlugRules { prefix: self.strip_prefix.clone(), suffix: self.strip_suffix.clone() }
    }

    pub fn role_rules(&self) -> RoleRules {
        RoleRules { prefix: self.role_strip_prefix.clone(), suffix: self.role_strip_suffix.clone() }
    }
}

/// Files under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub basedir: PathBuf,
}

impl Paths {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self { basedir: basedir.into() }
    }

    pub fn lash_dir(&self) -> PathBuf {
        self.basedir.join("lash")
    }

    pub fn config(&self) -> PathBuf {
        self.lash_dir().join("config.json")
    }

    pub fn token_cache(&self) -> PathBuf {
        self.lash_dir().join("oidc.json")
    }

    pub fn profile_cache(&self) -> PathBuf {
        self.lash_dir().join("profile.json")
    }

    pub fn credentials(&self) -> PathBuf {
        self.basedir.join("credentials")
    }
}

/// Load and validate the config file at `path`.
pub fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    let contents = std::fs::read_to_string(path).with_context(|| {
        format!(
            "cant open config {}\ndo you need to run `lash --init` to create your config file?",
            path.display()
        )
    })?;
    let config: FileConfig = serde_json::from_str(&contents).context("cant unmarshal config")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
