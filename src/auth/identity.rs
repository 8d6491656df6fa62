// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolved identity representation.
//!
//! This is the single output of the authentication decision and the type
//! handlers receive through the [`Identity`](super::Identity) extractor.

use serde::Serialize;

/// Final classification of a request's caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    /// The request must be rejected.
    Unauthenticated,
    /// Exempt request without a usable credential.
    Anonymous,
    /// Authenticated end user.
    User(String),
    /// Authenticated client application (master key).
    Client(String),
}

/// Outcome of authenticating one request.
///
/// Side flags are only reachable through the constructors:
/// `delegated_for` is set for users only and `master_key_auth` for clients only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    /// Who is calling.
    principal: Principal,

    /// User being acted upon after a verified delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    delegated_for: Option<String>,

    /// Caller authenticated purely with a client id/token pair.
    master_key_auth: bool,
}

impl ResolvedIdentity {
    fn bare(principal: Principal) -> Self {
        Self {
            principal,
            delegated_for: None,
            master_key_auth: false,
        }
    }

    pub fn unauthenticated() -> Self {
        Self::bare(Principal::Unauthenticated)
    }

    pub fn anonymous() -> Self {
        Self::bare(Principal::Anonymous)
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::bare(Principal::User(user_id.into()))
    }

    /// A user acting on behalf of `managed_user_id`.
    pub fn delegated(user_id: impl Into<String>, managed_user_id: impl Into<String>) -> Self {
        Self {
            principal: Principal::User(user_id.into()),
            delegated_for: Some(managed_user_id.into()),
            master_key_auth: false,
        }
    }

    /// A client application authenticated by its master key.
    pub fn client(client_id: impl Into<String>) -> Self {
        Self {
            principal: Principal::Client(client_id.into()),
            delegated_for: None,
            master_key_auth: true,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.principal == Principal::Unauthenticated
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal == Principal::Anonymous
    }

    /// The concrete user or client id, if any.
    pub fn subject_id(&self) -> Option<&str> {
        match &self.principal {
            Principal::User(id) | Principal::Client(id) => Some(id),
            Principal::Unauthenticated | Principal::Anonymous => None,
        }
    }

    pub fn delegated_for(&self) -> Option<&str> {
        self.delegated_for.as_deref()
    }

    pub fn master_key_auth(&self) -> bool {
        self.master_key_auth
    }

    /// The user id downstream calls should be scoped to: the managed user
    /// when delegation succeeded, otherwise the caller itself.
    pub fn effective_user_id(&self) -> Option<&str> {
        match &self.principal {
            Principal::User(id) => Some(self.delegated_for.as_deref().unwrap_or(id)),
            _ => None,
        }
    }
}
