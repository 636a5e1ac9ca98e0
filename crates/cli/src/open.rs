// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser launch and the manual confirmation gate of device authorization.

use std::io::{BufRead, BufReader};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use tracing::debug;

use crate::sso::oidc::DeviceAuthorization;
use crate::token::ConfirmFn;

/// One buffered reader over stdin, shared by every prompt in a run.
pub type SharedInput = Arc<Mutex<dyn BufRead + Send>>;

pub fn stdin_input() -> SharedInput {
    Arc::new(Mutex::new(BufReader::new(std::io::stdin())))
}

/// Lock the shared reader for the duration of one prompt.
pub fn lock_input(
    input: &SharedInput,
) -> anyhow::Result<MutexGuard<'_, dyn BufRead + Send + 'static>> {
    input.lock().map_err(|_| anyhow::anyhow!("stdin reader poisoned"))
}

/// Platform command that opens a URL in the default browser.
fn opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Open `url` in the default browser without waiting for it.
pub fn open_in_browser(url: &str) -> anyhow::Result<()> {
    let cmd = opener();
    std::process::Command::new(cmd)
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("failed to run {cmd}"))?;
    Ok(())
}

/// Show the verification URL and wait for one line on `input`.
pub fn await_confirmation(
    auth: &DeviceAuthorization,
    mut input: impl BufRead,
    open: impl Fn(&str) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let url = auth.verification_url();
    if let Err(e) = open(url) {
        debug!("cannot open browser: {e:#}");
    }

    eprintln!("approve this device at {url}");
    if !auth.user_code.is_empty() {
        eprintln!("code: {}", auth.user_code);
    }
    eprintln!("press enter when it's cooked");

    let mut line = String::new();
    let n = input.read_line(&mut line).context("cant scan stdin")?;
    if n == 0 {
        anyhow::bail!("stdin closed before confirmation");
    }
    Ok(())
}

/// A gate that opens the URL with `open` and waits for a line on `input`.
pub fn confirmation_from(
    input: SharedInput,
    open: impl Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
) -> ConfirmFn {
    Arc::new(move |auth: &DeviceAuthorization| {
        let mut reader = lock_input(&input)?;
        await_confirmation(auth, &mut *reader, &open)
    })
}

/// The interactive gate: browser plus a line from stdin.
pub fn stdin_confirmation(input: SharedInput) -> ConfirmFn {
    confirmation_from(input, open_in_browser)
}

#[cfg(test)]
#[path = "open_tests.rs"]
mod tests;
