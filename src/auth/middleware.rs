// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Runs the [`Authenticator`](super::Authenticator) for every request routed
//! through it:
//!
//! - `Unauthenticated` → 401, the handler never runs
//! - anything else → the [`ResolvedIdentity`] is stored in the request
//!   extensions and the request continues
//!
//! JSON bodies are buffered (up to `max_body_bytes`) so `request.userId` can
//! be read, then handed on unchanged. Other bodies stream through untouched.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/v1/user/read/{id}", get(read_user))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate_request));
//! ```

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, header::CONTENT_TYPE, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::{AuthError, InboundRequest, ResolvedIdentity};
use crate::state::AppState;

/// Authentication middleware function.
pub async fn authenticate_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let (body, json) = if is_json(&parts.headers) {
        if declared_length(&parts.headers).is_some_and(|len| len > state.max_body_bytes) {
            return AuthError::PayloadTooLarge.into_response();
        }
        let bytes = match to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => return AuthError::InvalidBody(e.to_string()).into_response(),
        };
        let json = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(&bytes).ok()
        };
        (Body::from(bytes), json)
    } else {
        (body, None)
    };

    let identity: ResolvedIdentity = {
        let inbound = InboundRequest::new(&parts.headers, parts.uri.path())
            .with_query(parts.uri.query())
            .with_body(json.as_ref());
        state.authenticator.authenticate(&inbound).await
    };

    if identity.is_unauthenticated() {
        return AuthError::Unauthenticated.into_response();
    }

    parts.extensions.insert(identity);
    next.run(Request::from_parts(parts, body)).await
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// `application/json` or any `+json` media type.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}
