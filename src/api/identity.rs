// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity diagnostics: who the gateway thinks is calling, and how a path
//! would be treated.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{CredentialRole, Identity, Principal, ResolvedIdentity};
use crate::error::ApiError;
use crate::state::AppState;

/// Resolved caller identity.
#[derive(Debug, Serialize, ToSchema)]
pub struct WhoAmIResponse {
    /// `user`, `client` or `anonymous`.
    pub kind: String,
    /// User or client id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Managed user after a verified delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated_for: Option<String>,
    pub master_key_auth: bool,
    /// User id downstream calls should be scoped to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_user_id: Option<String>,
}

impl From<&ResolvedIdentity> for WhoAmIResponse {
    fn from(identity: &ResolvedIdentity) -> Self {
        let kind = match identity.principal() {
            Principal::Unauthenticated => "unauthenticated",
            Principal::Anonymous => "anonymous",
            Principal::User(_) => "user",
            Principal::Client(_) => "client",
        };
        Self {
            kind: kind.to_string(),
            id: identity.subject_id().map(String::from),
            delegated_for: identity.delegated_for().map(String::from),
            master_key_auth: identity.master_key_auth(),
            effective_user_id: identity.effective_user_id().map(String::from),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RouteQuery {
    /// Request path to classify, e.g. `/v1/object/read/do_123`.
    pub path: Option<String>,
}

/// How the gateway treats a request path.
#[derive(Debug, Serialize, ToSchema)]
pub struct RouteInfoResponse {
    pub path: String,
    /// Listed in the exemption table (directly or via its parent route).
    pub exempt: bool,
    /// Internal, server-to-server route.
    pub private: bool,
    /// On the restricted route list.
    pub restricted: bool,
    /// `optional` or `mandatory`.
    pub authentication: String,
    /// Credential role to header name.
    pub credential_headers: BTreeMap<String, String>,
}

/// Return the identity resolved for this request.
#[utoipa::path(
    get,
    path = "/v1/auth/whoami",
    tag = "Auth",
    params(
        ("x-authenticated-user-token" = Option<String>, Header, description = "Access token"),
        ("x-authenticated-for" = Option<String>, Header, description = "Delegation token"),
        ("x-authenticated-client-id" = Option<String>, Header, description = "Client id"),
        ("x-authenticated-client-token" = Option<String>, Header, description = "Client key")
    ),
    responses(
        (status = 200, description = "Caller identity", body = WhoAmIResponse),
        (status = 401, description = "Authentication failed")
    )
)]
pub async fn whoami(Identity(identity): Identity) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse::from(&identity))
}

/// Classify a request path against the exemption table.
#[utoipa::path(
    get,
    path = "/v1/auth/routes",
    tag = "Auth",
    params(RouteQuery),
    responses(
        (status = 200, description = "Route classification", body = RouteInfoResponse),
        (status = 400, description = "Missing path"),
        (status = 401, description = "Authentication failed")
    )
)]
pub async fn route_info(
    State(state): State<AppState>,
    Identity(_caller): Identity,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteInfoResponse>, ApiError> {
    let path = query
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter `path` is required"))?;

    let authenticator = &state.authenticator;
    let registry = authenticator.registry();
    let exempt = registry.is_exempt(&path);
    let private = registry.is_private(&path);

    let credential_headers = CredentialRole::ALL
        .iter()
        .map(|role| {
            let header = authenticator.extractor().headers().name(*role);
            (role.to_string(), header.as_str().to_string())
        })
        .collect();

    Ok(Json(RouteInfoResponse {
        exempt,
        private,
        restricted: registry.is_restricted(&path),
        authentication: if exempt || private {
            "optional"
        } else {
            "mandatory"
        }
        .to_string(),
        credential_headers,
        path,
    }))
}
