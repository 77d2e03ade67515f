//! Core library for notekeep - a client for the notes REST service.
//!
//! The interesting part lives in [`auth::SessionManager`]: it owns the
//! access/refresh token pair, persists it through a pluggable
//! [`auth::TokenStore`], and implements the refresh-or-logout protocol
//! that every authenticated request goes through. [`api::ApiClient`]
//! wraps it with one method per REST endpoint.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionManager, TokenPair, TokenStore};
pub use config::Config;
