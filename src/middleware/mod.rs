// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Middleware modules (authentication, security headers).

pub mod auth;
pub mod security;

pub use auth::{require_auth, AuthUser};
