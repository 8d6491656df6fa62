// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the resolved request identity.
//!
//! ```rust,ignore
//! async fn my_handler(Identity(identity): Identity) -> impl IntoResponse {
//!     // identity is ResolvedIdentity (user, client or anonymous)
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthError, ResolvedIdentity};

/// Extractor for the identity resolved by the auth middleware.
///
/// Never re-authenticates: the middleware is the single decision point.
pub struct Identity(pub ResolvedIdentity);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ResolvedIdentity>()
            .cloned()
            .map(Identity)
            .ok_or(AuthError::MissingIdentity)
    }
}
