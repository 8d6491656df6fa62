// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM cert chain and key; both → HTTPS | plain HTTP |
//! | `AUTH_JWKS_URL` | JWKS endpoint (HTTPS) for token signature keys | - |
//! | `AUTH_SHARED_SECRET` | HS256 secret, used when no JWKS URL is set | - |
//! | `AUTH_ISSUER` | Expected access token `iss` | unchecked |
//! | `AUTH_AUDIENCE` | Expected access token `aud` | unchecked |
//! | `AUTH_CLIENT_KEYS` | Client master keys, `id:key,id:key` | none |
//! | `AUTH_EXEMPT_PATHS` | Extra exempt paths, comma-separated | none |
//! | `AUTH_MAX_BODY_BYTES` | Body buffer limit for target-user extraction | `2097152` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::auth::jwks::JwksError;
use crate::auth::{ClientRegistry, ExemptionRegistry, JwksManager, JwtTokenVerifier, KeySource};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_SHARED_SECRET_ENV: &str = "AUTH_SHARED_SECRET";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const AUTH_CLIENT_KEYS_ENV: &str = "AUTH_CLIENT_KEYS";
pub const AUTH_EXEMPT_PATHS_ENV: &str = "AUTH_EXEMPT_PATHS";
pub const AUTH_MAX_BODY_BYTES_ENV: &str = "AUTH_MAX_BODY_BYTES";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no token key source: set AUTH_JWKS_URL or AUTH_SHARED_SECRET")]
    MissingKeySource,

    #[error("invalid AUTH_JWKS_URL: {0}")]
    InvalidJwksUrl(String),

    #[error("AUTH_JWKS_URL must use https")]
    InsecureJwksUrl,

    #[error("invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("invalid value for {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("malformed AUTH_CLIENT_KEYS entry #{0} (expected id:key)")]
    InvalidClientKey(usize),

    #[error("TLS_CERT_PATH and TLS_KEY_PATH must be set together")]
    PartialTls,

    #[error(transparent)]
    Jwks(#[from] JwksError),
}

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where access and delegation token keys come from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySourceConfig {
    Jwks(Url),
    SharedSecret(String),
}

impl std::fmt::Debug for KeySourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySourceConfig::Jwks(url) => f.debug_tuple("Jwks").field(&url.as_str()).finish(),
            KeySourceConfig::SharedSecret(_) => f.write_str("SharedSecret(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub tls: Option<TlsPaths>,
    pub key_source: KeySourceConfig,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub clients: ClientRegistry,
    pub extra_exempt_paths: Vec<String>,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(raw) => parse_number(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };
        let bind: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(format!("{host}:{port}")))?;

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTls),
        };

        let key_source = match (var(AUTH_JWKS_URL_ENV), var(AUTH_SHARED_SECRET_ENV)) {
            (Some(raw), _) => KeySourceConfig::Jwks(parse_jwks_url(&raw)?),
            (None, Some(secret)) => KeySourceConfig::SharedSecret(secret),
            (None, None) => return Err(ConfigError::MissingKeySource),
        };

        let clients = match var(AUTH_CLIENT_KEYS_ENV) {
            Some(raw) => parse_client_keys(&raw)?,
            None => ClientRegistry::new(),
        };

        let extra_exempt_paths = var(AUTH_EXEMPT_PATHS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let max_body_bytes = match var(AUTH_MAX_BODY_BYTES_ENV) {
            Some(raw) => parse_number(AUTH_MAX_BODY_BYTES_ENV, &raw)?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind,
            tls,
            key_source,
            issuer: var(AUTH_ISSUER_ENV),
            audience: var(AUTH_AUDIENCE_ENV),
            clients,
            extra_exempt_paths,
            max_body_bytes,
            log_format,
        })
    }

    /// Exemption table: defaults plus `AUTH_EXEMPT_PATHS`.
    pub fn exemption_registry(&self) -> ExemptionRegistry {
        ExemptionRegistry::default().with_exempt_paths(self.extra_exempt_paths.iter().cloned())
    }

    /// Build the token verifier. Also returns the JWKS manager, if any, for
    /// readiness checks.
    pub fn token_verifier(&self) -> Result<(JwtTokenVerifier, Option<JwksManager>), ConfigError> {
        let (keys, jwks) = match &self.key_source {
            KeySourceConfig::Jwks(url) => {
                let manager = JwksManager::new(url.as_str())?;
                (KeySource::Jwks(manager.clone()), Some(manager))
            }
            KeySourceConfig::SharedSecret(secret) => {
                (KeySource::shared_secret(secret.as_bytes()), None)
            }
        };

        let mut verifier = JwtTokenVerifier::new(keys).with_clients(self.clients.clone());
        if let Some(ref issuer) = self.issuer {
            verifier = verifier.with_issuer(issuer);
        }
        if let Some(ref audience) = self.audience {
            verifier = verifier.with_audience(audience);
        }
        Ok((verifier, jwks))
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}

fn parse_jwks_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidJwksUrl(e.to_string()))?;
    if url.scheme() != "https" {
        return Err(ConfigError::InsecureJwksUrl);
    }
    Ok(url)
}

/// Parse `id:key,id:key`. Keys may themselves contain `:`.
fn parse_client_keys(raw: &str) -> Result<ClientRegistry, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .try_fold(ClientRegistry::new(), |registry, (index, entry)| {
            match entry.split_once(':') {
                Some((id, key)) if !id.trim().is_empty() && !key.is_empty() => {
                    Ok(registry.with_client(id.trim(), key))
                }
                _ => Err(ConfigError::InvalidClientKey(index + 1)),
            }
        })
}
