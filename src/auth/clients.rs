// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client application registry.
//!
//! Client applications authenticate with an id and a master key. Only the
//! SHA-256 digest of each key is kept in memory.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type KeyDigest = [u8; 32];

/// Known client applications and their master key digests.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, KeyDigest>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a client.
    pub fn with_client(mut self, client_id: impl Into<String>, master_key: &str) -> Self {
        self.clients.insert(client_id.into(), digest(master_key));
        self
    }

    /// Check a client id/key pair. Unknown clients never verify.
    pub fn verify(&self, client_id: &str, master_key: &str) -> bool {
        match self.clients.get(client_id) {
            Some(expected) => bool::from(expected[..].ct_eq(&digest(master_key)[..])),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn digest(key: &str) -> KeyDigest {
    Sha256::digest(key.as_bytes()).into()
}
