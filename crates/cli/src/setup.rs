// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! First-run setup: create the lash directory and write a fresh config.

use std::fs::DirBuilder;
use std::io::{BufRead, Write};
use std::os::unix::fs::DirBuilderExt;

use anyhow::Context;
use tracing::info;

use crate::cache::{self, CACHE_DIR_MODE};
use crate::config::{FileConfig, Paths};

/// Ask for one non-empty value, re-prompting on blank lines.
fn prompt(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> anyhow::Result<String> {
    loop {
        write!(out, "{label} ~> ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("cant scan stdin")? == 0 {
            anyhow::bail!("stdin closed before {} was given", label.trim());
        }
        let value = line.trim();
        if !value.is_empty() {
            return Ok(value.to_owned());
        }
    }
}

/// Create `<basedir>/lash` (0700) and replace `config.json` with the
/// region and start url read from `input`. Other settings are dropped.
pub fn run_setup(
    paths: &Paths,
    mut input: impl BufRead,
    mut out: impl Write,
) -> anyhow::Result<FileConfig> {
    if !paths.basedir.is_dir() {
        anyhow::bail!("basedir '{}' does not exist", paths.basedir.display());
    }

    let lash = paths.lash_dir();
    if !lash.exists() {
        DirBuilder::new()
            .mode(CACHE_DIR_MODE)
            .create(&lash)
            .with_context(|| format!("cant mkdir '{}'", lash.display()))?;
    }

    writeln!(out, "tell me some things for config")?;
    writeln!(out, "~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~")?;
    let region = prompt(&mut input, &mut out, "   region")?;
    let start_url = prompt(&mut input, &mut out, "start url")?;

    let config = FileConfig { region, start_url, ..Default::default() };
    let mut json = serde_json::to_vec_pretty(&config).context("cant marshal new config")?;
    json.push(b'\n');

    let path = paths.config();
    cache::write(&path, &json).with_context(|| format!("cant write config {}", path.display()))?;
    info!(path = %path.display(), "wrote config");
    Ok(config)
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod tests;
