// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route exemption table.
//!
//! Decides which request paths may proceed without mandatory authentication.
//!
//! ## Matching Rules
//!
//! - Exact membership of the raw path in the exempt set.
//! - Otherwise the first and last `/` segments are dropped and the remainder
//!   is looked up again, so `/v1/object/read/{id}` matches `/v1/object/read`.
//! - Any path containing the private marker (`private`) is a service-to-service
//!   route and also skips end-user authentication.
//!
//! The one-segment strip is deliberately loose: every registered path `p`
//! also admits `p/<anything>`. Route owners rely on this, so it stays.
//!
//! The registry is built once at start-up and never mutated, so it can be
//! shared behind an `Arc` without locking.

use std::collections::HashSet;

/// Substring marking internal, server-to-server routes.
pub const PRIVATE_MARKER: &str = "private";

/// Paths that may run unauthenticated (or fall back to anonymous).
const DEFAULT_EXEMPT_PATHS: &[&str] = &[
    "/v1/user/create",
    "/v2/user/create",
    "/v3/user/create",
    "/v1/user/signup",
    "/v1/org/search",
    "/service/health",
    "/health",
    "/v1/notification/email",
    "/v1/data/sync",
    "/v1/user/data/encrypt",
    "/v1/user/data/decrypt",
    "/v1/file/upload",
    "/v1/user/forgotpassword",
    "/v1/user/login",
    "/v1/user/logout",
    "/v1/object/read/list",
    "/v1/object/read",
    "/v1/object/create",
    "/v1/object/update",
    "/v1/object/delete",
    "/v1/object/search",
    "/v1/object/metrics",
    "/v1/client/register",
    "/v1/client/key/read",
    "/v1/notification/send",
    "/v1/user/getuser",
    "/v1/notification/audience",
    "/v1/org/preferences/read",
    "/v1/org/preferences/create",
    "/v1/org/preferences/update",
    "/v1/telemetry",
    // Badging APIs are public.
    "/v1/issuer/create",
    "/v1/issuer/read",
    "/v1/issuer/list",
    "/v1/issuer/delete",
    "/v1/issuer/badge/create",
    "/v1/issuer/badge/read",
    "/v1/issuer/badge/search",
    "/v1/issuer/badge/delete",
    "/v1/issuer/badge/assertion/create",
    "/v1/issuer/badge/assertion/read",
    "/v1/issuer/badge/assertion/search",
    "/v1/issuer/badge/assertion/delete",
    "/v1/org/read",
    "/v1/location/create",
    "/v1/location/update",
    "/v1/location/search",
    "/v1/location/delete",
    "/v1/otp/generate",
    "/v1/otp/verify",
    "/v1/user/get/email",
    "/v1/user/get/phone",
    "/v1/user/get/loginId",
    "/v1/user/get/loginid",
    "/v1/system/settings/get",
    "/v1/system/settings/list",
    "/v1/user/mock/read",
    "/v1/cache/clear",
    "/private/user/v1/search",
    "/private/user/v1/migrate",
    "/private/user/v1/identifier/freeup",
    "/private/user/v1/password/reset",
    "/private/user/v1/certs/add",
    "/v1/user/exists/email",
    "/v1/user/exists/phone",
    "/v1/role/read",
    // Gateway API docs.
    "/docs",
    "/docs/",
    "/api-doc",
];

/// Routes reserved for private/internal authentication.
///
/// Informational only: the decider relies on [`PRIVATE_MARKER`] instead.
const DEFAULT_RESTRICTED_PATHS: &[&str] = &[
    "/v1/user/update",
    "/v1/note/create",
    "/v1/note/update",
    "/v1/note/search",
    "/v1/note/read",
    "/v1/note/delete",
    "/v1/user/feed",
];

/// Immutable exemption and restricted-route tables.
#[derive(Debug, Clone)]
pub struct ExemptionRegistry {
    exempt: HashSet<String>,
    restricted: HashSet<String>,
    private_marker: String,
}

impl ExemptionRegistry {
    /// Build a registry from explicit tables.
    pub fn new<E, R>(exempt: E, restricted: R) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            exempt: exempt.into_iter().map(Into::into).collect(),
            restricted: restricted.into_iter().map(Into::into).collect(),
            private_marker: PRIVATE_MARKER.to_string(),
        }
    }

    /// Registry with no exemptions at all.
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new())
    }

    /// Add extra exempt paths (e.g. from `AUTH_EXEMPT_PATHS`).
    pub fn with_exempt_paths<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.exempt.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Check whether a path may proceed without mandatory authentication.
    ///
    /// Blank paths are never exempt.
    pub fn is_exempt(&self, path: &str) -> bool {
        if path.trim().is_empty() {
            return false;
        }
        if self.exempt.contains(path) {
            return true;
        }
        self.exempt.contains(&strip_path_param(path))
    }

    /// Check whether a path is an internal, server-to-server route.
    pub fn is_private(&self, path: &str) -> bool {
        path.contains(self.private_marker.as_str())
    }

    /// Check whether a path is on the restricted list.
    pub fn is_restricted(&self, path: &str) -> bool {
        self.restricted.contains(path)
    }

    /// Number of exempt entries.
    pub fn exempt_len(&self) -> usize {
        self.exempt.len()
    }
}

impl Default for ExemptionRegistry {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXEMPT_PATHS.iter().copied(),
            DEFAULT_RESTRICTED_PATHS.iter().copied(),
        )
    }
}

/// Drop the first and last `/` segments and rejoin the rest with `/` prefixes.
///
/// Trailing empty segments are discarded before the last one is dropped, so
/// `/v1/user/read/` and `/v1/user/read` both reduce to `/v1/user`.
fn strip_path_param(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').collect();
    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }
    if segments.len() < 2 {
        return String::new();
    }
    segments[1..segments.len() - 1]
        .iter()
        .fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(segment);
            acc
        })
}
