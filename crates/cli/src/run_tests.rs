// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;

use super::*;
use crate::cache;
use crate::test_support::{counting_confirm, mock_config, spawn_mock_sso, MockAccount, MockSso};

fn accounts() -> Vec<MockAccount> {
    vec![
        MockAccount::new("111", "Startup Data Dev", &["team-admin", "team-read"]),
        MockAccount::new("222", "Startup Data Prod", &["team-admin"]),
        MockAccount::new("333", "Startup Project Lab", &["poweruser"]),
    ]
}

/// Serve `mock` and write a config pointing at it under `basedir`.
async fn serve_configured(mock: MockSso, basedir: &Path) -> anyhow::Result<Arc<MockSso>> {
    let (state, base) = spawn_mock_sso(mock).await?;
    let mut config = mock_config(&base);
    config.strip_prefix = "startup-".to_owned();
    config.role_strip_prefix = "team-".to_owned();
    config.nicks.insert("lab".to_owned(), "project-lab-poweruser".to_owned());
    cache::write_json(&Paths::new(basedir).config(), &config)?;
    Ok(state)
}

struct Invocation {
    result: Result<Outcome, LashError>,
    out: String,
    err: String,
}

async fn invoke(basedir: &Path, args: &[&str]) -> Invocation {
    let dir = basedir.display().to_string();
    let mut argv = vec!["lash", "-d", dir.as_str()];
    argv.extend_from_slice(args);
    let cli = Config::parse_from(argv);

    let (confirm, _) = counting_confirm();
    let input: SharedInput = Arc::new(std::sync::Mutex::new(Cursor::new(Vec::new())));
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut streams = Streams { input, out: &mut out, err: &mut err, palette: Palette::plain() };
    let result = run(&cli, confirm, RetryPolicy::none(), &mut streams).await;

    Invocation {
        result,
        out: String::from_utf8_lossy(&out).into_owned(),
        err: String::from_utf8_lossy(&err).into_owned(),
    }
}

fn code(result: &Result<Outcome, LashError>) -> Option<ErrorCode> {
    result.as_ref().err().map(|e| e.code)
}

#[tokio::test]
async fn no_choice_lists_profiles() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &[]).await;
    assert!(matches!(inv.result, Ok(Outcome::Listed)));
    assert_eq!(inv.err, "use one of the following roles:\n");
    assert_eq!(
        inv.out,
        "      data-dev-admin\n      data-dev-read\n      data-prod-admin\n      project-lab-poweruser\n"
    );
    Ok(())
}

#[tokio::test]
async fn unique_match_writes_credentials() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["dev-read"]).await;
    let Ok(Outcome::CredentialsWritten { path, profile }) = inv.result else {
        anyhow::bail!("expected credentials to be written, got {:?}", inv.result);
    };
    assert_eq!(profile, "data-dev-read");
    assert_eq!(inv.err, "selected: data-dev-read\n");

    let written = std::fs::read_to_string(&path)?;
    assert!(written.starts_with("[default]\naws_access_key_id=AKIA111\n"));
    assert!(written.contains("aws_secret_access_key=secret-team-read\n"));
    assert_eq!(std::fs::metadata(&path)?.permissions().mode() & 0o777, 0o600);

    // Caches are owner-only and reused on the next run.
    let paths = Paths::new(tmp.path());
    for cache_file in [paths.token_cache(), paths.profile_cache()] {
        assert_eq!(std::fs::metadata(&cache_file)?.permissions().mode() & 0o777, 0o600);
    }
    invoke(tmp.path(), &["prod"]).await.result?;
    assert_eq!(state.hits.register.load(Ordering::SeqCst), 1);
    assert_eq!(state.hits.accounts.load(Ordering::SeqCst), 1);
    assert_eq!(state.hits.credentials.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn refresh_flag_rebuilds_both_caches() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    invoke(tmp.path(), &["prod"]).await.result?;
    invoke(tmp.path(), &["-r", "prod"]).await.result?;
    assert_eq!(state.hits.register.load(Ordering::SeqCst), 2);
    assert_eq!(state.hits.accounts.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn ambiguous_choice_lists_matches() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["admin"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::Resolution));
    assert_eq!(inv.result.as_ref().err().map(LashError::exit_code), Some(11));
    assert!(inv.err.starts_with("available roles:\n"));
    assert_eq!(
        inv.out,
        "  ~>  data-dev-admin\n      data-dev-read\n  ~>  data-prod-admin\n      project-lab-poweruser\n"
    );
    assert_eq!(state.hits.credentials.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn unknown_choice_fails_resolution() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["staging"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::Resolution));
    let message = inv.result.err().map(|e| e.to_string()).unwrap_or_default();
    assert_eq!(message, "'staging' does not match any profile");
    assert!(!inv.out.contains("~>"));
    Ok(())
}

#[tokio::test]
async fn nicknames_apply_unless_disabled() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["lab"]).await;
    assert!(matches!(inv.result, Ok(Outcome::CredentialsWritten { .. })));
    assert_eq!(inv.err, "selected (via nicks): project-lab-poweruser\n");

    let inv = invoke(tmp.path(), &["-n", "lab"]).await;
    assert_eq!(inv.err, "selected: project-lab-poweruser\n");
    Ok(())
}

#[tokio::test]
async fn url_flag_prints_console_url() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["-u", "prod"]).await;
    let Ok(Outcome::ConsoleUrl(url)) = inv.result else {
        anyhow::bail!("expected a console url, got {:?}", inv.result);
    };
    assert_eq!(inv.out, format!("{url}\n"));
    assert!(url.query_pairs().any(|(k, v)| k == "SigninToken" && v == "mock-signin-token"));
    assert_eq!(state.hits.federation.load(Ordering::SeqCst), 1);
    assert!(!Paths::new(tmp.path()).credentials().exists());
    Ok(())
}

#[tokio::test]
async fn command_hands_keys_to_exec() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["prod", "sh", "-c", "env"]).await;
    let Ok(Outcome::Exec { program, argv, keys, profile }) = inv.result else {
        anyhow::bail!("expected exec, got {:?}", inv.result);
    };
    assert!(program.is_absolute());
    assert_eq!(argv, vec!["sh", "-c", "env"]);
    assert_eq!(keys.access_key_id, "AKIA222");
    assert_eq!(profile, "data-prod-admin");
    assert!(!Paths::new(tmp.path()).credentials().exists());
    Ok(())
}

#[tokio::test]
async fn unknown_command_fails_before_network() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;

    let inv = invoke(tmp.path(), &["prod", "lash-no-such-command"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::Command));
    assert_eq!(state.hits.register.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn missing_config_is_a_config_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let inv = invoke(tmp.path(), &["prod"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::Config));
    Ok(())
}

#[tokio::test]
async fn insecure_token_cache_is_a_cache_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let state = serve_configured(MockSso::with_accounts(accounts()), tmp.path()).await?;
    let token_cache = Paths::new(tmp.path()).token_cache();
    std::fs::write(&token_cache, r#"{"value": "x", "expiresIn": 3600}"#)?;
    std::fs::set_permissions(&token_cache, std::fs::Permissions::from_mode(0o644))?;

    let inv = invoke(tmp.path(), &["prod"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::CacheIntegrity));
    assert_eq!(state.hits.register.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn missing_keys_are_an_issuance_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mock = MockSso {
        role_credentials: Some(serde_json::json!({"accessKeyId": "A"})),
        ..MockSso::with_accounts(accounts())
    };
    serve_configured(mock, tmp.path()).await?;

    let inv = invoke(tmp.path(), &["prod"]).await;
    assert_eq!(code(&inv.result), Some(ErrorCode::Issuance));
    assert!(!Paths::new(tmp.path()).credentials().exists());
    Ok(())
}
