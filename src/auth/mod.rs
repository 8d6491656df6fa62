// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Decides, before any business logic runs, who is making a request.
//!
//! ## Auth Flow
//!
//! 1. The exemption table decides whether authentication is mandatory
//! 2. Credential headers and the targeted user id are extracted
//! 3. The decider verifies what it needs through a [`TokenVerifier`]:
//!    - `x-authenticated-user-token` → end user
//!    - `x-authenticated-for` → delegated access to a managed user
//!    - `x-authenticated-client-id` + `x-authenticated-client-token` → client app
//! 4. The result is a [`ResolvedIdentity`]: user, client, anonymous or
//!    unauthenticated (rejected with 401)
//!
//! ## Security
//!
//! - Mandatory paths fail closed, including on verifier outages
//! - Exempt paths fail open to anonymous
//! - Token material is never logged

pub mod clients;
pub mod credentials;
pub mod decider;
pub mod error;
pub mod exemptions;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod jwt;
pub mod middleware;
pub mod verifier;

pub use clients::ClientRegistry;
pub use credentials::{
    CredentialBundle, CredentialExtractor, CredentialHeaders, CredentialRole, InboundRequest,
};
pub use decider::Authenticator;
pub use error::AuthError;
pub use exemptions::ExemptionRegistry;
pub use extractor::Identity;
pub use identity::{Principal, ResolvedIdentity};
pub use jwks::JwksManager;
pub use jwt::{JwtTokenVerifier, KeySource};
pub use middleware::authenticate_request;
pub use verifier::{TokenVerifier, Verdict, VerifierError};
