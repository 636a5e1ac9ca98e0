// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod cache;
pub mod config;
pub mod console;
pub mod directory;
pub mod error;
pub mod issuer;
pub mod open;
pub mod output;
pub mod resolve;
pub mod run;
pub mod setup;
pub mod sink;
pub mod sso;
pub mod token;

#[cfg(test)]
pub mod test_support;
