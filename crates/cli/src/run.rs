// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level control flow, shared by `main` and integration tests.

use std::io::Write;
use std::path::PathBuf;

use reqwest::Url;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config, FileConfig, Paths};
use crate::console;
use crate::directory::ProfileDirectory;
use crate::error::{ErrorCode, LashError, ResultExt};
use crate::issuer::{CredentialIssuer, Keys};
use crate::open::{self, SharedInput};
use crate::output::{self, Palette};
use crate::resolve::{self, Badge, BadgeIndex, Resolution};
use crate::setup;
use crate::sink;
use crate::sso::oidc::OidcClient;
use crate::sso::portal::PortalClient;
use crate::sso::retry::RetryPolicy;
use crate::sso::{self, Endpoints};
use crate::token::{ConfirmFn, TokenManager};

/// Streams the pipeline talks to the user through.
pub struct Streams<'a> {
    pub input: SharedInput,
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub palette: Palette,
}

/// How a successful run ended.
#[derive(Debug)]
pub enum Outcome {
    /// Profiles were listed; nothing was selected.
    Listed,
    CredentialsWritten { path: PathBuf, profile: String },
    ConsoleUrl(Url),
    /// Keys are ready for the command; the caller replaces the process.
    Exec { program: PathBuf, argv: Vec<String>, keys: Keys, profile: String },
}

/// The wired-up components for one base directory and config.
pub struct Lash {
    pub paths: Paths,
    pub config: FileConfig,
    pub endpoints: Endpoints,
    http: reqwest::Client,
    tokens: TokenManager,
    directory: ProfileDirectory,
    issuer: CredentialIssuer,
}

impl Lash {
    pub fn new(
        paths: Paths,
        config: FileConfig,
        http: reqwest::Client,
        confirm: ConfirmFn,
        retry: RetryPolicy,
    ) -> Self {
        let endpoints = config.endpoints();
        let oidc = OidcClient::new(http.clone(), endpoints.oidc.clone());
        let portal = PortalClient::new(http.clone(), endpoints.portal.clone(), retry);

        let tokens =
            TokenManager::new(paths.token_cache(), oidc, config.start_url.clone(), confirm);
        let directory =
            ProfileDirectory::new(paths.profile_cache(), portal.clone(), config.slug_rules());
        let issuer = CredentialIssuer::new(portal);

        Self { paths, config, endpoints, http, tokens, directory, issuer }
    }

    /// Token, profiles, then resolution of `choice`. Returns `None` when
    /// there was nothing to choose and the profiles were listed instead.
    pub async fn select(
        &self,
        choice: &str,
        use_nicks: bool,
        refresh: bool,
        streams: &mut Streams<'_>,
    ) -> Result<Option<(String, Badge, String)>, LashError> {
        let token = self
            .tokens
            .get_token(refresh)
            .await
            .map_err(|e| LashError::from_cache_stage(ErrorCode::TokenAcquisition, e))?;

        let profiles = self
            .directory
            .get_profiles(&token.value, refresh)
            .await
            .map_err(|e| LashError::from_cache_stage(ErrorCode::DirectoryEnumeration, e))?;

        let index = BadgeIndex::build(&profiles, &self.config.role_rules());
        debug!(profiles = index.len(), "built profile index");

        let nicks = use_nicks.then_some(&self.config.nicks);
        match resolve::resolve(&index, choice, nicks) {
            Resolution::Selected { name, badge, via_nick, .. } => {
                writeln!(streams.err, "{}", output::selected_line(&name, via_nick))
                    .code(ErrorCode::Init)?;
                Ok(Some((name, badge, token.value)))
            }
            Resolution::NoChoice { available } => {
                list(streams, false, &available, &[])?;
                Ok(None)
            }
            Resolution::Ambiguous { choice, available, matches } => {
                list(streams, true, &available, &matches)?;
                Err(LashError::new(
                    ErrorCode::Resolution,
                    anyhow::anyhow!("'{choice}' matches more than one profile"),
                ))
            }
            Resolution::NoMatch { choice, available } => {
                list(streams, true, &available, &[])?;
                Err(LashError::new(
                    ErrorCode::Resolution,
                    anyhow::anyhow!("'{choice}' does not match any profile"),
                ))
            }
        }
    }

    pub async fn issue(&self, badge: &Badge, token: &str) -> Result<Keys, LashError> {
        self.issuer.issue(badge, token).await.code(ErrorCode::Issuance)
    }

    pub async fn console_url(&self, keys: &Keys) -> Result<Url, LashError> {
        console::signin_url(&self.http, &self.endpoints.federation, keys)
            .await
            .code(ErrorCode::Console)
    }
}

fn list(
    streams: &mut Streams<'_>,
    choice_given: bool,
    available: &[String],
    matches: &[String],
) -> Result<(), LashError> {
    writeln!(streams.err, "{}", output::listing_header(choice_given)).code(ErrorCode::Init)?;
    let listing = output::role_listing(available, matches, &streams.palette);
    streams.out.write_all(listing.as_bytes()).code(ErrorCode::Init)
}

/// Run one invocation to completion, short of replacing the process.
pub async fn run(
    cli: &Config,
    confirm: ConfirmFn,
    retry: RetryPolicy,
    streams: &mut Streams<'_>,
) -> Result<Outcome, LashError> {
    let paths = Paths::new(cli.basedir().code(ErrorCode::Init)?);

    // The command is checked before any network traffic.
    let program = match cli.command.first() {
        Some(name) => Some(sink::resolve_command(name).code(ErrorCode::Command)?),
        None => None,
    };

    if cli.init {
        // Released before the confirmation gate reads the same input.
        let mut input = open::lock_input(&streams.input).code(ErrorCode::Setup)?;
        setup::run_setup(&paths, &mut *input, &mut *streams.err).code(ErrorCode::Setup)?;
    }

    let file_config = config::load_file_config(&paths.config()).code(ErrorCode::Config)?;
    let http = sso::http_client().code(ErrorCode::Init)?;
    let lash = Lash::new(paths, file_config, http, confirm, retry);

    let Some((profile, badge, token)) =
        lash.select(cli.choice(), !cli.no_nicks, cli.refresh, streams).await?
    else {
        return Ok(Outcome::Listed);
    };

    let keys = lash.issue(&badge, &token).await?;

    if cli.url {
        let url = lash.console_url(&keys).await?;
        writeln!(streams.out, "{url}").code(ErrorCode::Console)?;
        return Ok(Outcome::ConsoleUrl(url));
    }

    match program {
        Some(program) => Ok(Outcome::Exec { program, argv: cli.command.clone(), keys, profile }),
        None => {
            let path = lash.paths.credentials();
            sink::write_credentials_file(&path, &keys).code(ErrorCode::CredentialsFile)?;
            debug!(path = %path.display(), "wrote credentials");
            Ok(Outcome::CredentialsWritten { path, profile })
        }
    }
}

/// Initialize tracing from config. Logs go to stderr.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            let _ = fmt::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .try_init();
        }
        _ => {
            let _ = fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
