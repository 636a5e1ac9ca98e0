// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use crate::cache::InsecureCacheFile;

/// Failure classes surfaced by the binary, each with a fixed exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Init,
    Config,
    Setup,
    CacheIntegrity,
    TokenAcquisition,
    DirectoryEnumeration,
    Issuance,
    CredentialsFile,
    Command,
    Resolution,
    Console,
}

impl ErrorCode {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Init => 1,
            Self::Config => 2,
            Self::Setup => 3,
            Self::CacheIntegrity => 4,
            Self::TokenAcquisition => 4,
            Self::DirectoryEnumeration => 4,
            Self::Issuance => 5,
            Self::CredentialsFile => 6,
            Self::Command => 9,
            Self::Resolution => 11,
            Self::Console => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Config => "CONFIG",
            Self::Setup => "SETUP",
            Self::CacheIntegrity => "CACHE_INTEGRITY",
            Self::TokenAcquisition => "TOKEN_ACQUISITION",
            Self::DirectoryEnumeration => "DIRECTORY_ENUMERATION",
            Self::Issuance => "ISSUANCE",
            Self::CredentialsFile => "CREDENTIALS_FILE",
            Self::Command => "COMMAND",
            Self::Resolution => "RESOLUTION",
            Self::Console => "CONSOLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with the stage that produced it.
#[derive(Debug)]
pub struct LashError {
    pub code: ErrorCode,
    source: anyhow::Error,
}

impl LashError {
    pub fn new(code: ErrorCode, source: impl Into<anyhow::Error>) -> Self {
        Self { code, source: source.into() }
    }

    /// Tag an error from a cache-backed stage. A permission violation on a
    /// cache file anywhere in the chain wins over the stage's own code.
    pub fn from_cache_stage(code: ErrorCode, source: anyhow::Error) -> Self {
        let insecure = source.chain().any(|e| e.downcast_ref::<InsecureCacheFile>().is_some());
        let code = if insecure { ErrorCode::CacheIntegrity } else { code };
        Self { code, source }
    }

    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Display for LashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.source)
        } else {
            write!(f, "{}", self.source)
        }
    }
}

impl std::error::Error for LashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Attach an [`ErrorCode`] to any fallible result.
pub trait ResultExt<T> {
    fn code(self, code: ErrorCode) -> Result<T, LashError>;
}

impl<T, E: Into<anyhow::Error>> ResultExt<T> for Result<T, E> {
    fn code(self, code: ErrorCode) -> Result<T, LashError> {
        self.map_err(|e| LashError::new(code, e))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
