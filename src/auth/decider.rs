// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Decision
//!
//! Resolves one request to a [`ResolvedIdentity`].
//!
//! ## Mandatory Authentication (non-exempt, non-private paths)
//!
//! 1. Access token present: verify it. Rejected → `Unauthenticated`.
//!    - Target user absent or equal to the caller → `User(caller)`.
//!    - Target differs and no delegation token → `User(caller)`. Delegation
//!      is opportunistic: differing ids alone do not reject the request.
//!    - Target differs and a delegation token is present: verify it for
//!      (caller, target). Rejected → `Unauthenticated` even though the access
//!      token was fine. Accepted → `User(caller)` delegated for the target.
//! 2. Else client id and client token both present: verify the pair.
//!    Accepted → `Client(id)` with the master-key flag.
//! 3. Else → `Unauthenticated`.
//!
//! Verifier errors fail closed here: they classify as `Unauthenticated`.
//!
//! ## Optional Authentication (exempt or private paths)
//!
//! An access token, if any, is verified best-effort. Anything other than a
//! verified identity, including verifier errors, yields `Anonymous`.
//!
//! ## Concurrency
//!
//! `Authenticator` holds only immutable state and is shared behind an `Arc`.
//! No lock is held across verifier calls, and dropping the future between
//! calls abandons the decision without leaving anything behind.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::credentials::{CredentialBundle, CredentialExtractor, InboundRequest};
use super::exemptions::ExemptionRegistry;
use super::identity::ResolvedIdentity;
use super::verifier::{TokenVerifier, VerifierError};

/// The authentication decider.
#[derive(Clone)]
pub struct Authenticator {
    registry: Arc<ExemptionRegistry>,
    extractor: CredentialExtractor,
    verifier: Arc<dyn TokenVerifier>,
}

impl Authenticator {
    pub fn new(registry: Arc<ExemptionRegistry>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            registry,
            extractor: CredentialExtractor::default(),
            verifier,
        }
    }

    pub fn registry(&self) -> &ExemptionRegistry {
        &self.registry
    }

    pub fn extractor(&self) -> &CredentialExtractor {
        &self.extractor
    }

    /// Whether `path` may proceed without mandatory authentication.
    pub fn is_exempt_path(&self, path: &str) -> bool {
        self.registry.is_exempt(path)
    }

    /// Resolve the identity behind a request. Never fails.
    pub async fn authenticate(&self, request: &InboundRequest<'_>) -> ResolvedIdentity {
        let credentials = self.extractor.extract(request);
        let path = request.path;

        let identity = if self.registry.is_exempt(path) || self.registry.is_private(path) {
            self.authenticate_optional(&credentials).await
        } else {
            match self.authenticate_mandatory(&credentials).await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(path, error = %e, "Token verification failed, rejecting request");
                    ResolvedIdentity::unauthenticated()
                }
            }
        };

        debug!(
            path,
            principal = ?identity.principal(),
            delegated_for = ?identity.delegated_for(),
            master_key_auth = identity.master_key_auth(),
            "Request authenticated"
        );
        identity
    }

    async fn authenticate_mandatory(
        &self,
        credentials: &CredentialBundle,
    ) -> Result<ResolvedIdentity, VerifierError> {
        if let Some(token) = credentials.access_token.as_deref() {
            let Some(caller_id) = self.verifier.verify_user(token).await?.identity() else {
                return Ok(ResolvedIdentity::unauthenticated());
            };
            return self.resolve_delegation(caller_id, credentials).await;
        }

        if let Some((client_id, client_token)) = credentials.client_pair() {
            let verdict = self.verifier.verify_client(client_id, client_token).await?;
            return Ok(match verdict.identity() {
                Some(id) => ResolvedIdentity::client(id),
                None => ResolvedIdentity::unauthenticated(),
            });
        }

        Ok(ResolvedIdentity::unauthenticated())
    }

    /// Cross-check the caller against the user the request targets.
    async fn resolve_delegation(
        &self,
        caller_id: String,
        credentials: &CredentialBundle,
    ) -> Result<ResolvedIdentity, VerifierError> {
        let target_id = match credentials.target_user_id.as_deref() {
            Some(target) if target != caller_id => target,
            _ => {
                if credentials.delegation_token().is_some() {
                    debug!("Ignoring delegation token, request targets the caller");
                }
                return Ok(ResolvedIdentity::user(caller_id));
            }
        };

        let Some(token) = credentials.delegation_token() else {
            debug!(
                caller_id = %caller_id,
                target_id,
                "Target differs from caller but no delegation token sent"
            );
            return Ok(ResolvedIdentity::user(caller_id));
        };

        let verdict = self
            .verifier
            .verify_delegation(token, &caller_id, target_id)
            .await?;
        match verdict.identity() {
            Some(managed_id) => Ok(ResolvedIdentity::delegated(caller_id, managed_id)),
            None => {
                info!(caller_id = %caller_id, target_id, "Delegation token rejected");
                Ok(ResolvedIdentity::unauthenticated())
            }
        }
    }

    async fn authenticate_optional(&self, credentials: &CredentialBundle) -> ResolvedIdentity {
        let Some(token) = credentials.access_token.as_deref() else {
            return ResolvedIdentity::anonymous();
        };

        match self.verifier.verify_user(token).await {
            Ok(verdict) => verdict
                .identity()
                .map(ResolvedIdentity::user)
                .unwrap_or_else(ResolvedIdentity::anonymous),
            Err(e) => {
                warn!(
                    error = %e,
                    "Token verification failed on exempt path, continuing anonymously"
                );
                ResolvedIdentity::anonymous()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{HeaderMap, HeaderValue};
    use serde_json::json;

    use super::*;
    use crate::auth::credentials::{
        CLIENT_ID_HEADER, CLIENT_TOKEN_HEADER, DELEGATION_TOKEN_HEADER, USER_TOKEN_HEADER,
    };
    use crate::auth::identity::Principal;
    use crate::auth::verifier::stub::{Behaviour, StubVerifier};

    const MANAGED: &str = "123e4567-e89b-12d3-a456-426614174000";

    fn verifier() -> StubVerifier {
        StubVerifier::new()
            .user("good-token", "U1")
            .client("portal", "master-key")
            .delegation("for-token", "U1", MANAGED)
    }

    fn authenticator(verifier: StubVerifier) -> Authenticator {
        Authenticator::new(Arc::new(ExemptionRegistry::default()), Arc::new(verifier))
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    async fn run(
        auth: &Authenticator,
        path: &str,
        pairs: &[(&'static str, &str)],
    ) -> ResolvedIdentity {
        let map = headers(pairs);
        auth.authenticate(&InboundRequest::new(&map, path)).await
    }

    #[tokio::test]
    async fn no_credentials_on_protected_path_is_unauthenticated() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/read", &[]).await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn valid_token_without_target_resolves_user() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/search", &[(USER_TOKEN_HEADER, "good-token")]).await;
        assert_eq!(identity, ResolvedIdentity::user("U1"));
        assert_eq!(identity.delegated_for(), None);
    }

    #[tokio::test]
    async fn invalid_token_on_protected_path_is_unauthenticated() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/search", &[(USER_TOKEN_HEADER, "bad-token")]).await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn invalid_access_token_does_not_fall_back_to_client_pair() {
        let auth = authenticator(verifier());
        let identity = run(
            &auth,
            "/v1/user/search",
            &[
                (USER_TOKEN_HEADER, "bad-token"),
                (CLIENT_ID_HEADER, "portal"),
                (CLIENT_TOKEN_HEADER, "master-key"),
            ],
        )
        .await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn verified_delegation_sets_delegated_for() {
        let auth = authenticator(verifier());
        let path = format!("/v1/user/read/{MANAGED}");
        let identity = run(
            &auth,
            &path,
            &[
                (USER_TOKEN_HEADER, "good-token"),
                (DELEGATION_TOKEN_HEADER, "for-token"),
            ],
        )
        .await;
        assert_eq!(identity.principal(), &Principal::User("U1".to_string()));
        assert_eq!(identity.delegated_for(), Some(MANAGED));
    }

    #[tokio::test]
    async fn rejected_delegation_invalidates_valid_access_token() {
        let auth = authenticator(verifier());
        let path = format!("/v1/user/read/{MANAGED}");
        let identity = run(
            &auth,
            &path,
            &[
                (USER_TOKEN_HEADER, "good-token"),
                (DELEGATION_TOKEN_HEADER, "forged"),
            ],
        )
        .await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn differing_target_without_delegation_header_proceeds_as_caller() {
        let auth = authenticator(verifier());
        let path = format!("/v1/user/read/{MANAGED}");
        let identity = run(&auth, &path, &[(USER_TOKEN_HEADER, "good-token")]).await;
        assert_eq!(identity, ResolvedIdentity::user("U1"));
        assert_eq!(identity.delegated_for(), None);
    }

    #[tokio::test]
    async fn empty_delegation_header_is_not_an_attempt() {
        let auth = authenticator(verifier());
        let path = format!("/v1/user/read/{MANAGED}");
        let identity = run(
            &auth,
            &path,
            &[
                (USER_TOKEN_HEADER, "good-token"),
                (DELEGATION_TOKEN_HEADER, ""),
            ],
        )
        .await;
        assert_eq!(identity, ResolvedIdentity::user("U1"));
    }

    #[tokio::test]
    async fn delegation_token_ignored_when_target_is_caller() {
        let caller = "0f8fad5b-d9cb-469f-a165-70867728950e";
        let auth = authenticator(StubVerifier::new().user("t", caller));
        let path = format!("/v1/user/read/{caller}");
        let identity = run(
            &auth,
            &path,
            &[
                (USER_TOKEN_HEADER, "t"),
                (DELEGATION_TOKEN_HEADER, "whatever"),
            ],
        )
        .await;
        assert_eq!(identity, ResolvedIdentity::user(caller));
    }

    #[tokio::test]
    async fn body_target_triggers_delegation_check() {
        let auth = authenticator(verifier());
        let map = headers(&[
            (USER_TOKEN_HEADER, "good-token"),
            (DELEGATION_TOKEN_HEADER, "for-token"),
        ]);
        let body = json!({ "request": { "userId": MANAGED, "firstName": "Kid" } });
        let request = InboundRequest::new(&map, "/v1/user/update").with_body(Some(&body));
        let identity = auth.authenticate(&request).await;
        assert_eq!(identity, ResolvedIdentity::delegated("U1", MANAGED));
    }

    #[tokio::test]
    async fn client_pair_resolves_client_with_master_key_flag() {
        let auth = authenticator(verifier());
        let identity = run(
            &auth,
            "/v1/user/search",
            &[
                (CLIENT_ID_HEADER, "portal"),
                (CLIENT_TOKEN_HEADER, "master-key"),
            ],
        )
        .await;
        assert_eq!(identity.principal(), &Principal::Client("portal".to_string()));
        assert!(identity.master_key_auth());
    }

    #[tokio::test]
    async fn wrong_client_key_is_unauthenticated() {
        let auth = authenticator(verifier());
        let identity = run(
            &auth,
            "/v1/user/search",
            &[
                (CLIENT_ID_HEADER, "portal"),
                (CLIENT_TOKEN_HEADER, "nope"),
            ],
        )
        .await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn half_client_pair_is_unauthenticated() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/search", &[(CLIENT_TOKEN_HEADER, "master-key")]).await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn exempt_path_without_token_is_anonymous() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/create", &[]).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn exempt_path_with_invalid_token_is_anonymous() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/user/create", &[(USER_TOKEN_HEADER, "bad-token")]).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn exempt_path_with_valid_token_resolves_user() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/v1/org/read/org-1", &[(USER_TOKEN_HEADER, "good-token")]).await;
        assert_eq!(identity, ResolvedIdentity::user("U1"));
    }

    #[tokio::test]
    async fn exempt_path_ignores_client_pair() {
        let auth = authenticator(verifier());
        let identity = run(
            &auth,
            "/v1/user/create",
            &[
                (CLIENT_ID_HEADER, "portal"),
                (CLIENT_TOKEN_HEADER, "master-key"),
            ],
        )
        .await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn private_path_is_optional_auth() {
        let auth = authenticator(verifier());
        let identity = run(&auth, "/private/user/v1/lookup", &[]).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn verifier_error_fails_open_on_exempt_path() {
        let auth = authenticator(verifier().behaviour(Behaviour::Fail));
        let identity = run(&auth, "/v1/user/create", &[(USER_TOKEN_HEADER, "good-token")]).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn verifier_error_fails_closed_on_protected_path() {
        let auth = authenticator(verifier().behaviour(Behaviour::Fail));
        let identity = run(&auth, "/v1/user/search", &[(USER_TOKEN_HEADER, "good-token")]).await;
        assert!(identity.is_unauthenticated());

        let identity = run(
            &auth,
            "/v1/user/search",
            &[
                (CLIENT_ID_HEADER, "portal"),
                (CLIENT_TOKEN_HEADER, "master-key"),
            ],
        )
        .await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn delegation_verifier_error_fails_closed() {
        let auth = authenticator(verifier().delegation_behaviour(Behaviour::Fail));
        let path = format!("/v1/user/read/{MANAGED}");
        let identity = run(
            &auth,
            &path,
            &[
                (USER_TOKEN_HEADER, "good-token"),
                (DELEGATION_TOKEN_HEADER, "for-token"),
            ],
        )
        .await;
        assert!(identity.is_unauthenticated());
    }

    #[tokio::test]
    async fn blank_identity_from_verifier_is_rejected() {
        let auth = authenticator(StubVerifier::new().user("t", " "));
        let identity = run(&auth, "/v1/user/search", &[(USER_TOKEN_HEADER, "t")]).await;
        assert!(identity.is_unauthenticated());

        let identity = run(&auth, "/v1/user/create", &[(USER_TOKEN_HEADER, "t")]).await;
        assert!(identity.is_anonymous());
    }

    #[tokio::test]
    async fn custom_registry_is_respected() {
        let registry = ExemptionRegistry::empty().with_exempt_paths(["/v1/open"]);
        let auth = Authenticator::new(Arc::new(registry), Arc::new(verifier()));
        assert!(auth.is_exempt_path("/v1/open/anything"));
        assert!(!auth.is_exempt_path("/v1/user/create"));
        assert!(run(&auth, "/v1/user/create", &[]).await.is_unauthenticated());
        assert!(run(&auth, "/v1/open", &[]).await.is_anonymous());
    }

    #[tokio::test]
    async fn decision_can_be_abandoned_mid_verification() {
        let auth = authenticator(verifier().behaviour(Behaviour::Hang));
        let map = headers(&[(USER_TOKEN_HEADER, "good-token")]);
        let request = InboundRequest::new(&map, "/v1/user/search");
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), auth.authenticate(&request)).await;
        assert!(outcome.is_err());

        // Still usable afterwards.
        let auth = authenticator(verifier());
        assert_eq!(auth.authenticate(&request).await, ResolvedIdentity::user("U1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_are_independent() {
        let auth = Arc::new(authenticator(verifier().user("other-token", "U2")));
        let mut handles = Vec::new();
        for i in 0..64 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move {
                let (token, expected) = if i % 2 == 0 {
                    ("good-token", "U1")
                } else {
                    ("other-token", "U2")
                };
                let map = headers(&[(USER_TOKEN_HEADER, token)]);
                let identity = auth
                    .authenticate(&InboundRequest::new(&map, "/v1/user/search"))
                    .await;
                (identity, expected)
            }));
        }
        for handle in handles {
            let (identity, expected) = handle.await.unwrap();
            assert_eq!(identity, ResolvedIdentity::user(expected));
        }
    }
}
