// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential extraction.
//!
//! Pulls the evidence the decider needs out of one request: the four
//! credential headers and the id of the user the request targets.
//!
//! ## Target User Resolution
//!
//! - JSON body present: `request.userId` (create, update, search calls)
//! - No JSON body: last path segment, if it parses as a UUID (read calls)
//!
//! Extraction is pure. Nothing here fails; missing or malformed evidence is
//! simply absent from the bundle.

use axum::http::{HeaderMap, HeaderName};
use serde_json::Value;
use uuid::Uuid;

/// Header carrying the end-user access token.
pub const USER_TOKEN_HEADER: &str = "x-authenticated-user-token";
/// Header carrying the client application id.
pub const CLIENT_ID_HEADER: &str = "x-authenticated-client-id";
/// Header carrying the client application token (master key).
pub const CLIENT_TOKEN_HEADER: &str = "x-authenticated-client-token";
/// Header carrying the delegation ("authenticated-for") token.
pub const DELEGATION_TOKEN_HEADER: &str = "x-authenticated-for";

/// Credential roles a request can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialRole {
    AccessToken,
    ClientId,
    ClientToken,
    DelegationToken,
}

impl CredentialRole {
    pub const ALL: [CredentialRole; 4] = [
        CredentialRole::AccessToken,
        CredentialRole::ClientId,
        CredentialRole::ClientToken,
        CredentialRole::DelegationToken,
    ];
}

impl std::fmt::Display for CredentialRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialRole::AccessToken => write!(f, "access_token"),
            CredentialRole::ClientId => write!(f, "client_id"),
            CredentialRole::ClientToken => write!(f, "client_token"),
            CredentialRole::DelegationToken => write!(f, "delegation_token"),
        }
    }
}

/// Maps each credential role to the header that carries it.
#[derive(Debug, Clone)]
pub struct CredentialHeaders {
    access_token: HeaderName,
    client_id: HeaderName,
    client_token: HeaderName,
    delegation_token: HeaderName,
}

impl CredentialHeaders {
    pub fn new(
        access_token: HeaderName,
        client_id: HeaderName,
        client_token: HeaderName,
        delegation_token: HeaderName,
    ) -> Self {
        Self {
            access_token,
            client_id,
            client_token,
            delegation_token,
        }
    }

    /// Header name for a role.
    pub fn name(&self, role: CredentialRole) -> &HeaderName {
        match role {
            CredentialRole::AccessToken => &self.access_token,
            CredentialRole::ClientId => &self.client_id,
            CredentialRole::ClientToken => &self.client_token,
            CredentialRole::DelegationToken => &self.delegation_token,
        }
    }

    /// Read the value for a role. Presence is what counts: an empty header is
    /// still `Some("")`, and non-UTF-8 bytes are kept lossily so a garbled
    /// token fails verification instead of looking absent.
    pub fn value(&self, headers: &HeaderMap, role: CredentialRole) -> Option<String> {
        headers
            .get(self.name(role))
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }
}

impl Default for CredentialHeaders {
    fn default() -> Self {
        Self::new(
            HeaderName::from_static(USER_TOKEN_HEADER),
            HeaderName::from_static(CLIENT_ID_HEADER),
            HeaderName::from_static(CLIENT_TOKEN_HEADER),
            HeaderName::from_static(DELEGATION_TOKEN_HEADER),
        )
    }
}

/// Framework-neutral view of the parts of a request that matter for
/// authentication.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub headers: &'a HeaderMap,
    pub path: &'a str,
    pub query: Option<&'a str>,
    /// Parsed JSON body, if the request carried one.
    pub body: Option<&'a Value>,
}

impl<'a> InboundRequest<'a> {
    pub fn new(headers: &'a HeaderMap, path: &'a str) -> Self {
        Self {
            headers,
            path,
            query: None,
            body: None,
        }
    }

    pub fn with_query(mut self, query: Option<&'a str>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Option<&'a Value>) -> Self {
        self.body = body;
        self
    }
}

/// Evidence extracted from one request. Never persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialBundle {
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_token: Option<String>,
    pub delegation_token: Option<String>,
    pub target_user_id: Option<String>,
}

impl CredentialBundle {
    /// Client id and token, only when both are present.
    pub fn client_pair(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_token) {
            (Some(id), Some(token)) => Some((id, token)),
            _ => None,
        }
    }

    /// Delegation token, treating an empty header as absent.
    pub fn delegation_token(&self) -> Option<&str> {
        self.delegation_token.as_deref().filter(|t| !t.is_empty())
    }
}

// Tokens must not end up in logs.
impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_token", &self.client_token.as_ref().map(|_| "<redacted>"))
            .field(
                "delegation_token",
                &self.delegation_token.as_ref().map(|_| "<redacted>"),
            )
            .field("target_user_id", &self.target_user_id)
            .finish()
    }
}

/// Builds [`CredentialBundle`]s using a configured header table.
#[derive(Debug, Clone, Default)]
pub struct CredentialExtractor {
    headers: CredentialHeaders,
}

impl CredentialExtractor {
    pub fn new(headers: CredentialHeaders) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &CredentialHeaders {
        &self.headers
    }

    pub fn extract(&self, request: &InboundRequest<'_>) -> CredentialBundle {
        let value = |role| self.headers.value(request.headers, role);
        CredentialBundle {
            access_token: value(CredentialRole::AccessToken),
            client_id: value(CredentialRole::ClientId),
            client_token: value(CredentialRole::ClientToken),
            delegation_token: value(CredentialRole::DelegationToken),
            target_user_id: target_user_id(request),
        }
    }
}

/// Id of the user a request acts upon, if it names one.
pub fn target_user_id(request: &InboundRequest<'_>) -> Option<String> {
    match request.body {
        Some(body) => target_from_body(body),
        None => target_from_path(request.path, request.query),
    }
}

fn target_from_body(body: &Value) -> Option<String> {
    let user_id = body.get("request")?.get("userId")?;
    let text = match user_id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn target_from_path(path: &str, query: Option<&str>) -> Option<String> {
    let mut segment = path.trim_end_matches('/').rsplit('/').next()?;
    if query.is_some_and(|q| !q.is_empty()) {
        segment = segment.split('?').next().unwrap_or_default();
    }
    parse_uuid(segment)
}

/// Parse a hyphenated UUID (`8-4-4-4-12` hex groups) into its canonical
/// lower-case form. Simple, braced and URN forms are not user ids.
fn parse_uuid(segment: &str) -> Option<String> {
    let groups: Vec<usize> = segment.split('-').map(str::len).collect();
    if groups != [8, 4, 4, 4, 12] {
        return None;
    }
    Uuid::try_parse(segment)
        .ok()
        .map(|id| id.hyphenated().to_string())
}
