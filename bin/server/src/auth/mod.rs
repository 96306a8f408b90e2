//! Authentication module for the RIM server.
//!
//! This module provides:
//! - Telegram login, logout and the current-user endpoints
//! - Session resolution from the `session_token` cookie or a bearer header
//! - Authentication extractors for Axum routes
//! - CSRF enforcement for cookie-authenticated mutating requests
//!
//! # Authorization Model
//!
//! Every extractor resolves the session against the session store and asks
//! the authorization gate for the caller's privilege on each request.
//! Nothing about identity or privilege is cached in the process, so
//! deactivation, logout and group changes apply to the very next request.

pub mod csrf;
pub mod middleware;
pub mod routes;

pub use middleware::{OptionalAuth, RequireAdmin, RequireAuth, session_token};

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session_token";
