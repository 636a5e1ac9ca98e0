// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materializing keys: the shared credentials file or a child's environment.

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::issuer::Keys;

/// Mode for a newly created credentials file.
pub const CREDENTIALS_MODE: u32 = 0o600;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_SESSION_EXPIRATION: &str = "AWS_SESSION_EXPIRATION";
pub const ENV_PROFILE_NAME: &str = "AWS_PROFILE_NAME";

/// The managed `[default]` section.
pub fn render_section(keys: &Keys) -> String {
    format!(
        "[default]\n\
         aws_access_key_id={}\n\
         aws_secret_access_key={}\n\
         aws_session_token={}\n\
         aws_security_token={}\n",
        keys.access_key_id, keys.secret_access_key, keys.session_token, keys.session_token,
    )
}

/// Sibling fragment path, e.g. `credentials-head`.
pub fn fragment_path(credentials: &Path, position: &str) -> PathBuf {
    let mut name = credentials.as_os_str().to_owned();
    name.push(format!("-{position}"));
    PathBuf::from(name)
}

/// Copy a fragment into `out`. Unreadable or empty fragments are skipped.
fn write_fragment(out: &mut impl Write, path: &Path) {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!(path = %path.display(), "no fragment: {e}");
            return;
        }
    };
    if bytes.is_empty() {
        return;
    }
    if let Err(e) = out.write_all(&bytes) {
        debug!(path = %path.display(), "cannot copy fragment: {e}");
    }
}

/// Truncate and rewrite the credentials file: head fragment, managed
/// section, tail fragment.
pub fn write_credentials_file(path: &Path, keys: &Keys) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CREDENTIALS_MODE)
        .open(path)
        .with_context(|| format!("cannot open creds file {}", path.display()))?;

    write_fragment(&mut file, &fragment_path(path, "head"));
    file.write_all(render_section(keys).as_bytes())
        .with_context(|| format!("cannot write creds file {}", path.display()))?;
    write_fragment(&mut file, &fragment_path(path, "tail"));

    file.sync_all().with_context(|| format!("cannot flush creds file {}", path.display()))
}

/// The five variables exported to a shimmed command.
pub fn session_environment(keys: &Keys, profile: &str) -> Vec<(&'static str, String)> {
    vec![
        (ENV_ACCESS_KEY_ID, keys.access_key_id.clone()),
        (ENV_SECRET_ACCESS_KEY, keys.secret_access_key.clone()),
        (ENV_SESSION_TOKEN, keys.session_token.clone()),
        (ENV_SESSION_EXPIRATION, keys.expiration.to_string()),
        (ENV_PROFILE_NAME, profile.to_owned()),
    ]
}

/// Merge `overrides` into `base`; overridden names keep a single entry.
pub fn merged_environment(
    base: impl IntoIterator<Item = (OsString, OsString)>,
    overrides: &[(&'static str, String)],
) -> Vec<(OsString, OsString)> {
    let mut env: Vec<(OsString, OsString)> = base
        .into_iter()
        .filter(|(k, _)| !overrides.iter().any(|(name, _)| OsStr::new(name) == k.as_os_str()))
        .collect();
    env.extend(overrides.iter().map(|(k, v)| (OsString::from(k), OsString::from(v))));
    env
}

/// Locate the command to shim. Paths starting with `./` or `/` are taken
/// as given (made absolute); bare names are searched on `PATH`.
pub fn resolve_command(name: &str) -> anyhow::Result<PathBuf> {
    let candidate = if name.starts_with("./") || name.starts_with('/') {
        std::path::absolute(name).with_context(|| format!("command '{name}' not parseable"))?
    } else {
        PathBuf::from(name)
    };
    which::which(&candidate).with_context(|| format!("command '{name}' not found"))
}

fn cstring(bytes: &[u8]) -> anyhow::Result<CString> {
    CString::new(bytes).context("argument contains a NUL byte")
}

/// Replace this process with `program`, exporting `keys` under `profile`.
///
/// `argv[0]` is the command as the user typed it. Only returns on failure.
pub fn exec_with_keys(
    program: &Path,
    argv: &[String],
    keys: &Keys,
    profile: &str,
) -> anyhow::Result<Infallible> {
    let path = cstring(program.as_os_str().as_bytes())?;
    let args = argv.iter().map(|a| cstring(a.as_bytes())).collect::<anyhow::Result<Vec<_>>>()?;

    let env = merged_environment(std::env::vars_os(), &session_environment(keys, profile));
    let env = env
        .iter()
        .map(|(k, v)| {
            let mut pair = k.as_bytes().to_vec();
            pair.push(b'=');
            pair.extend_from_slice(v.as_bytes());
            cstring(&pair)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(program = %program.display(), "exec");
    nix::unistd::execve(&path, &args, &env)
        .with_context(|| format!("cant exec command {}", program.display()))
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
