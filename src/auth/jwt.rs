// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT-backed [`TokenVerifier`].
//!
//! ## Token Formats
//!
//! - **Access token**: signed JWT, identity in `sub`. `iss` and `aud` are
//!   checked when configured.
//! - **Delegation token**: signed JWT issued to a managing user. `parentId`
//!   names the managing (grantor) user and `sub` the managed user. It is only
//!   accepted for the exact (grantor, target) pair the request presents.
//! - **Client pair**: checked against the [`ClientRegistry`].
//!
//! Keys come either from a JWKS endpoint (asymmetric, `kid` lookup) or from a
//! shared HS256 secret. Bad signatures, expiry, claim mismatches and unknown
//! keys are ordinary rejections; an unreachable JWKS endpoint is an error.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::clients::ClientRegistry;
use super::jwks::{JwksError, JwksManager};
use super::verifier::{TokenVerifier, Verdict, VerifierError};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Access token claims.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
}

/// Delegation ("authenticated-for") token claims.
#[derive(Debug, Deserialize)]
struct DelegationClaims {
    /// Managed user
    sub: String,
    /// Managing user that was granted access
    #[serde(rename = "parentId")]
    parent_id: String,
}

/// Where signature keys come from.
#[derive(Clone)]
pub enum KeySource {
    Jwks(JwksManager),
    Secret(DecodingKey),
}

impl KeySource {
    pub fn shared_secret(secret: &[u8]) -> Self {
        KeySource::Secret(DecodingKey::from_secret(secret))
    }
}

/// Token verifier over signed JWTs plus a static client registry.
#[derive(Clone)]
pub struct JwtTokenVerifier {
    keys: KeySource,
    issuer: Option<String>,
    audience: Option<String>,
    clients: ClientRegistry,
}

impl JwtTokenVerifier {
    pub fn new(keys: KeySource) -> Self {
        Self {
            keys,
            issuer: None,
            audience: None,
            clients: ClientRegistry::new(),
        }
    }

    /// Require access tokens to carry this `iss`.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Require access tokens to carry this `aud`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_clients(mut self, clients: ClientRegistry) -> Self {
        self.clients = clients;
        self
    }

    pub fn jwks(&self) -> Option<&JwksManager> {
        match &self.keys {
            KeySource::Jwks(manager) => Some(manager),
            KeySource::Secret(_) => None,
        }
    }

    /// Resolve the key for a token. `Ok(None)` means the token cannot be
    /// matched to any key and is simply rejected.
    async fn decoding_key(
        &self,
        token: &str,
    ) -> Result<Option<(DecodingKey, Algorithm)>, VerifierError> {
        let manager = match &self.keys {
            KeySource::Secret(key) => return Ok(Some((key.clone(), Algorithm::HS256))),
            KeySource::Jwks(manager) => manager,
        };

        let Ok(header) = decode_header(token) else {
            return Ok(None);
        };

        let lookup = match &header.kid {
            Some(kid) => manager.get_decoding_key(kid).await,
            None => manager.get_any_decoding_key().await,
        };

        match lookup {
            Ok(found) => Ok(Some(found)),
            Err(JwksError::NoMatchingKey) => Ok(None),
            Err(JwksError::Fetch(msg)) => Err(VerifierError::KeysUnavailable(msg)),
            Err(e @ JwksError::UnsupportedKey(_)) => Err(VerifierError::Internal(e.to_string())),
        }
    }

    /// Verify signature and registered claims, then decode `C`.
    async fn decode_claims<C: DeserializeOwned>(
        &self,
        token: &str,
        check_issuer_and_audience: bool,
    ) -> Result<Option<C>, VerifierError> {
        let Some((key, algorithm)) = self.decoding_key(token).await? else {
            return Ok(None);
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;

        if check_issuer_and_audience {
            if let Some(ref issuer) = self.issuer {
                validation.set_issuer(&[issuer]);
            }
            if let Some(ref audience) = self.audience {
                validation.set_audience(&[audience]);
                validation.validate_aud = true;
            }
        }

        match decode::<C>(token, &key, &validation) {
            Ok(data) => Ok(Some(data.claims)),
            Err(e) => {
                debug!(reason = ?e.kind(), "Token rejected");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify_user(&self, token: &str) -> Result<Verdict, VerifierError> {
        let claims: Option<AccessClaims> = self.decode_claims(token, true).await?;
        Ok(claims
            .map(|c| Verdict::Verified(c.sub))
            .unwrap_or(Verdict::Unauthenticated))
    }

    async fn verify_client(
        &self,
        client_id: &str,
        client_token: &str,
    ) -> Result<Verdict, VerifierError> {
        Ok(if self.clients.verify(client_id, client_token) {
            Verdict::Verified(client_id.to_string())
        } else {
            Verdict::Unauthenticated
        })
    }

    async fn verify_delegation(
        &self,
        token: &str,
        grantor_id: &str,
        target_id: &str,
    ) -> Result<Verdict, VerifierError> {
        let claims: Option<DelegationClaims> = self.decode_claims(token, false).await?;
        Ok(match claims {
            Some(c) if c.parent_id == grantor_id && c.sub == target_id => Verdict::Verified(c.sub),
            Some(_) => {
                debug!(grantor_id, target_id, "Delegation token issued for another pair");
                Verdict::Unauthenticated
            }
            None => Verdict::Unauthenticated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    use super::*;

    const SECRET: &[u8] = b"gateway-test-secret";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(claims: Value, secret: &[u8]) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verifier() -> JwtTokenVerifier {
        JwtTokenVerifier::new(KeySource::shared_secret(SECRET))
            .with_clients(ClientRegistry::new().with_client("portal", "master-key"))
    }

    #[tokio::test]
    async fn valid_access_token_yields_subject() {
        let token = sign(json!({ "sub": "U1", "exp": now() + 600 }), SECRET);
        let verdict = verifier().verify_user(&token).await.unwrap();
        assert_eq!(verdict, Verdict::Verified("U1".to_string()));
    }

    #[tokio::test]
    async fn expired_access_token_is_rejected() {
        let token = sign(json!({ "sub": "U1", "exp": now() - 3600 }), SECRET);
        let verdict = verifier().verify_user(&token).await.unwrap();
        assert_eq!(verdict, Verdict::Unauthenticated);
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected() {
        let token = sign(json!({ "sub": "U1", "exp": now() + 600 }), b"someone-else");
        let verdict = verifier().verify_user(&token).await.unwrap();
        assert_eq!(verdict, Verdict::Unauthenticated);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let verdict = verifier().verify_user("not-a-jwt").await.unwrap();
        assert_eq!(verdict, Verdict::Unauthenticated);
        let verdict = verifier().verify_user("").await.unwrap();
        assert_eq!(verdict, Verdict::Unauthenticated);
    }

    #[tokio::test]
    async fn issuer_and_audience_are_enforced_when_configured() {
        let verifier = verifier()
            .with_issuer("https://sso.example.org/realms/main")
            .with_audience("gateway");

        let good = sign(
            json!({
                "sub": "U1",
                "exp": now() + 600,
                "iss": "https://sso.example.org/realms/main",
                "aud": "gateway"
            }),
            SECRET,
        );
        assert_eq!(
            verifier.verify_user(&good).await.unwrap(),
            Verdict::Verified("U1".to_string())
        );

        let wrong_issuer = sign(
            json!({ "sub": "U1", "exp": now() + 600, "iss": "https://evil", "aud": "gateway" }),
            SECRET,
        );
        assert_eq!(
            verifier.verify_user(&wrong_issuer).await.unwrap(),
            Verdict::Unauthenticated
        );
    }

    #[tokio::test]
    async fn delegation_token_must_match_grantor_and_target() {
        let token = sign(
            json!({ "sub": "child", "parentId": "parent", "exp": now() + 600 }),
            SECRET,
        );
        let v = verifier();

        assert_eq!(
            v.verify_delegation(&token, "parent", "child").await.unwrap(),
            Verdict::Verified("child".to_string())
        );
        assert_eq!(
            v.verify_delegation(&token, "stranger", "child").await.unwrap(),
            Verdict::Unauthenticated
        );
        assert_eq!(
            v.verify_delegation(&token, "parent", "other-child").await.unwrap(),
            Verdict::Unauthenticated
        );
    }

    #[tokio::test]
    async fn delegation_token_without_parent_claim_is_rejected() {
        let token = sign(json!({ "sub": "child", "exp": now() + 600 }), SECRET);
        assert_eq!(
            verifier().verify_delegation(&token, "parent", "child").await.unwrap(),
            Verdict::Unauthenticated
        );
    }

    #[tokio::test]
    async fn client_pair_checked_against_registry() {
        let v = verifier();
        assert_eq!(
            v.verify_client("portal", "master-key").await.unwrap(),
            Verdict::Verified("portal".to_string())
        );
        assert_eq!(
            v.verify_client("portal", "guess").await.unwrap(),
            Verdict::Unauthenticated
        );
    }

    #[tokio::test]
    async fn unreachable_jwks_is_an_error_not_a_rejection() {
        let manager = JwksManager::new("http://127.0.0.1:1/jwks.json").unwrap();
        let v = JwtTokenVerifier::new(KeySource::Jwks(manager));
        let token = sign(json!({ "sub": "U1", "exp": now() + 600 }), SECRET);

        let result = v.verify_user(&token).await;
        assert!(matches!(result, Err(VerifierError::KeysUnavailable(_))));
        assert!(v.jwks().is_some());
    }

    #[tokio::test]
    async fn unparsable_token_never_reaches_jwks() {
        let manager = JwksManager::new("http://127.0.0.1:1/jwks.json").unwrap();
        let v = JwtTokenVerifier::new(KeySource::Jwks(manager));
        assert_eq!(v.verify_user("garbage").await.unwrap(), Verdict::Unauthenticated);
    }

    #[tokio::test]
    async fn signed_tokens_drive_the_authenticator() {
        use std::sync::Arc;

        use axum::http::{HeaderMap, HeaderValue};

        use crate::auth::credentials::USER_TOKEN_HEADER;
        use crate::auth::{Authenticator, ExemptionRegistry, InboundRequest, ResolvedIdentity};

        let auth = Authenticator::new(Arc::new(ExemptionRegistry::default()), Arc::new(verifier()));
        let good = sign(json!({ "sub": "U1", "exp": now() + 600 }), SECRET);
        let forged = sign(json!({ "sub": "U1", "exp": now() + 600 }), b"someone-else");

        let mut headers = HeaderMap::new();
        headers.insert(USER_TOKEN_HEADER, HeaderValue::from_str(&good).unwrap());
        let identity = auth.authenticate(&InboundRequest::new(&headers, "/v1/user/search")).await;
        assert_eq!(identity, ResolvedIdentity::user("U1"));

        headers.insert(USER_TOKEN_HEADER, HeaderValue::from_str(&forged).unwrap());
        let identity = auth.authenticate(&InboundRequest::new(&headers, "/v1/user/search")).await;
        assert!(identity.is_unauthenticated());
        let identity = auth.authenticate(&InboundRequest::new(&headers, "/v1/user/create")).await;
        assert!(identity.is_anonymous());
    }
}
