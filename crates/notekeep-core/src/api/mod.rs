//! REST API client for the notes service gateway.
//!
//! One method per endpoint; authentication (bearer header, single
//! refresh-and-retry) is handled entirely by the session manager, so
//! every endpoint method here is a thin caller.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
