// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STRUCTDT_VERBOSE` | [`EngineConfig::verbose`] |
//! | `STRUCTDT_AWAIT_COMPLETION` | [`EngineConfig::await_completion`] |
//! | `STRUCTDT_COMPLETION_SPIN_LIMIT` | [`EngineConfig::completion_spin_limit`] |
//!
//! Boolean variables accept `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`.

/// Environment variable enabling info-level layout logging.
pub const ENV_VERBOSE: &str = "STRUCTDT_VERBOSE";
/// Environment variable enabling completion awaiting for endpoint registration.
pub const ENV_AWAIT_COMPLETION: &str = "STRUCTDT_AWAIT_COMPLETION";
/// Environment variable overriding the completion spin limit.
pub const ENV_COMPLETION_SPIN_LIMIT: &str = "STRUCTDT_COMPLETION_SPIN_LIMIT";

/// Default number of backoff rounds spent waiting on a registration completion.
pub const DEFAULT_COMPLETION_SPIN_LIMIT: u32 = 1 << 16;

/// Runtime configuration shared by every datatype created from one context.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "loaders", serde(default))]
pub struct EngineConfig {
    /// Log create/destroy/register at info level instead of debug.
    pub verbose: bool,
    /// Wait for the endpoint's completion token before returning from
    /// endpoint-scoped registration. Off by default: registration is treated
    /// as synchronous and the token is not awaited.
    pub await_completion: bool,
    /// Backoff rounds before an unfinished completion is reported as a
    /// transport error. Only used with `await_completion`.
    pub completion_spin_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            await_completion: false,
            completion_spin_limit: DEFAULT_COMPLETION_SPIN_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `STRUCTDT_*` environment variables.
    ///
    /// Unparseable values are ignored (with a warning) and keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_VERBOSE) {
            match parse_bool(&v) {
                Some(b) => self.verbose = b,
                None => log::warn!("[structdt::config] ignoring {}={:?}", ENV_VERBOSE, v),
            }
        }
        if let Some(v) = lookup(ENV_AWAIT_COMPLETION) {
            match parse_bool(&v) {
                Some(b) => self.await_completion = b,
                None => log::warn!("[structdt::config] ignoring {}={:?}", ENV_AWAIT_COMPLETION, v),
            }
        }
        if let Some(v) = lookup(ENV_COMPLETION_SPIN_LIMIT) {
            match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => self.completion_spin_limit = n,
                _ => log::warn!(
                    "[structdt::config] ignoring {}={:?}",
                    ENV_COMPLETION_SPIN_LIMIT,
                    v
                ),
            }
        }
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn with_await_completion(mut self, await_completion: bool) -> Self {
        self.await_completion = await_completion;
        self
    }

    #[must_use]
    pub fn with_completion_spin_limit(mut self, limit: u32) -> Self {
        self.completion_spin_limit = limit.max(1);
        self
    }

    /// Log level for lifecycle messages.
    pub(crate) fn lifecycle_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
