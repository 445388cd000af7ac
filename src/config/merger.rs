// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Settings resolution.
//!
//! Precedence (highest to lowest):
//! 1. Explicit [`TracerOptions`]
//! 2. Environment variables
//! 3. Default values

use once_cell::sync::Lazy;

use super::types::{EnvSettings, ResolvedSettings, TracerOptions};
use super::{ENV_API_KEY, ENV_ENVIRONMENT, ENV_REPORT_URL};

static PROCESS_ENV: Lazy<EnvSettings> =
    Lazy::new(|| EnvSettings::from_lookup(|key| std::env::var(key).ok()));

impl EnvSettings {
    /// Read settings through an arbitrary lookup function.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_key: read(ENV_API_KEY),
            report_url: read(ENV_REPORT_URL),
            environment: read(ENV_ENVIRONMENT),
        }
    }

    /// The process environment, read once on first use.
    pub fn process() -> &'static EnvSettings {
        &PROCESS_ENV
    }
}

/// Merge explicit options over environment values and defaults.
pub fn resolve_settings(options: &TracerOptions, env: &EnvSettings) -> ResolvedSettings {
    let mut result = ResolvedSettings::default();

    apply_env(&mut result, env);
    apply_options(&mut result, options);

    result.report_url = result.report_url.trim_end_matches('/').to_string();
    result
}

fn apply_env(result: &mut ResolvedSettings, env: &EnvSettings) {
    if env.api_key.is_some() {
        result.api_key = env.api_key.clone();
    }

    if let Some(ref url) = env.report_url {
        result.report_url = url.clone();
    }

    if let Some(ref environment) = env.environment {
        result.environment = environment.clone();
    }
}

fn apply_options(result: &mut ResolvedSettings, options: &TracerOptions) {
    if options.api_key.is_some() {
        result.api_key = options.api_key.clone();
    }

    if let Some(ref url) = options.report_url {
        result.report_url = url.clone();
    }

    if let Some(ref environment) = options.environment {
        result.environment = environment.clone();
    }

    if let Some(push) = options.push_schema_on_startup {
        result.push_schema_on_startup = push;
    }

    if options.request_id_context_key.is_some() {
        result.request_id_context_key = options.request_id_context_key.clone();
    }

    if let Some(timeout) = options.timeout_ms {
        result.timeout_ms = timeout;
    }
}
