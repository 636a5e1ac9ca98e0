// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use lash::config::Config;
use lash::error::{ErrorCode, LashError};
use lash::open::{stdin_confirmation, stdin_input};
use lash::output::{color_enabled, Palette};
use lash::run::{init_tracing, run, Outcome, Streams};
use lash::sink::exec_with_keys;
use lash::sso::retry::RetryPolicy;

/// Exit status for incorrect invocation.
const EXIT_USAGE: i32 = 64;

#[tokio::main]
async fn main() {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(EXIT_USAGE);
    }

    init_tracing(&config);

    let _ = rustls::crypto::ring::default_provider().install_default();

    let no_color_env = std::env::var("NO_COLOR").ok();
    let palette = Palette::new(color_enabled(config.no_color, no_color_env.as_deref()));

    // Setup and the confirmation gate read through the same buffer.
    let input = stdin_input();
    let confirm = stdin_confirmation(input.clone());
    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let mut streams = Streams { input, out: &mut out, err: &mut err, palette };

    let outcome = run(&config, confirm, RetryPolicy::default(), &mut streams).await;

    match outcome {
        Ok(Outcome::Exec { program, argv, keys, profile }) => {
            if let Err(e) = exec_with_keys(&program, &argv, &keys, &profile) {
                fail(&LashError::new(ErrorCode::Command, e));
            }
        }
        Ok(_) => {}
        Err(e) => fail(&e),
    }
}

fn fail(e: &LashError) -> ! {
    eprintln!("error: {e:#}");
    std::process::exit(e.exit_code());
}
