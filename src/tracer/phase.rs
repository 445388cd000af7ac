// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lifecycle phases reported by the execution engine.

use std::fmt;

/// A lifecycle phase of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Static validation; seeds the report.
    Validate,
    /// Eager execution; finalizes only on failure.
    ExecuteQuery,
    /// Deferred completion; always finalizes.
    ExecuteQueryLazy,
    /// Any other engine phase. Passed through untouched.
    Other(String),
}

impl Phase {
    /// Engine name of the phase.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Validate => "validate",
            Self::ExecuteQuery => "execute_query",
            Self::ExecuteQueryLazy => "execute_query_lazy",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for Phase {
    fn from(name: &str) -> Self {
        match name {
            "validate" => Self::Validate,
            "execute_query" => Self::ExecuteQuery,
            "execute_query_lazy" => Self::ExecuteQueryLazy,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
