//! RIM directory server.
//!
//! HTTP API over the contact directory, with Telegram login, Redis-backed
//! sessions and group-based administrator rights.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod session_store;
pub mod system;
