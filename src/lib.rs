// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Auth Gateway - request authentication in front of user APIs
//!
//! Resolves every inbound request to an end user, a delegated user, a client
//! application or an anonymous caller before business handlers run.
//!
//! ## Modules
//!
//! - `api` - Gateway HTTP routes (health, identity diagnostics, docs)
//! - `auth` - Exemption table, credential extraction, token verification and the
//!   Axum middleware that ties them together
//! - `config` - Environment configuration
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
