// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for the tracer and the transport gateway.
//!
//! Settings come from three sources, merged with precedence
//! (explicit options > environment > defaults):
//! - [`TracerOptions`] passed by the host
//! - `HUBBURU_API_KEY`, `HUBBURU_REPORT_URL`, `HUBBURU_ENVIRONMENT`
//! - built-in defaults
//!
//! The environment is read once per process.

mod merger;
mod types;

pub use merger::resolve_settings;
pub use types::{EnvSettings, ResolvedSettings, TracerOptions};

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "HUBBURU_API_KEY";

/// Environment variable overriding the collector base URL.
pub const ENV_REPORT_URL: &str = "HUBBURU_REPORT_URL";

/// Environment variable overriding the environment tag.
pub const ENV_ENVIRONMENT: &str = "HUBBURU_ENVIRONMENT";

/// Default collector base URL.
pub const DEFAULT_REPORT_URL: &str = "https://report.hubburu.com";

/// Default environment tag.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Default timeout for blocking sends.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Resolve options against the process environment.
pub fn load_settings(options: &TracerOptions) -> ResolvedSettings {
    resolve_settings(options, EnvSettings::process())
}
