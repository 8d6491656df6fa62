// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{Authenticator, JwksManager};
use crate::config::DEFAULT_MAX_BODY_BYTES;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    /// Present when token keys come from a JWKS endpoint (readiness checks)
    pub jwks: Option<JwksManager>,
    /// Body buffer limit for the auth middleware
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            jwks: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_jwks(mut self, jwks: Option<JwksManager>) -> Self {
        self.jwks = jwks;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}
