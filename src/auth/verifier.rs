// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification contract.
//!
//! The decider never inspects tokens itself. It asks a [`TokenVerifier`] and
//! branches on the answer:
//!
//! - `Ok(Verdict::Verified(id))` - credential accepted, `id` is the identity
//! - `Ok(Verdict::Unauthenticated)` - expected failure (bad, expired, mismatched)
//! - `Err(VerifierError)` - the verifier itself could not answer
//!
//! Caching of verification results, if any, belongs to the implementation.

use async_trait::async_trait;
use thiserror::Error;

/// Answer for a credential the verifier could evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Verified(String),
    Unauthenticated,
}

impl Verdict {
    /// The verified identity. Blank identities count as unauthenticated.
    pub fn identity(self) -> Option<String> {
        match self {
            Verdict::Verified(id) if !id.trim().is_empty() => Some(id),
            _ => None,
        }
    }
}

/// The verifier could not reach a verdict.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),

    #[error("verifier internal error: {0}")]
    Internal(String),
}

/// Verification primitives consumed by the authentication decider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify an end-user access token.
    async fn verify_user(&self, token: &str) -> Result<Verdict, VerifierError>;

    /// Verify a client application id/token pair.
    async fn verify_client(&self, client_id: &str, client_token: &str)
        -> Result<Verdict, VerifierError>;

    /// Verify that `grantor_id` may act as `target_id` using `token`.
    async fn verify_delegation(
        &self,
        token: &str,
        grantor_id: &str,
        target_id: &str,
    ) -> Result<Verdict, VerifierError>;
}
