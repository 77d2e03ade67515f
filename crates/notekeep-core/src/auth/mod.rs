//! Session lifetime and token persistence.
//!
//! The backend issues short-lived access tokens paired with longer-lived
//! refresh tokens. [`SessionManager`] owns that pair: it is the only
//! component that reads or writes the persisted [`TokenStore`], and it
//! implements the refresh-or-logout protocol used by every
//! authenticated request.

pub mod session;
pub mod store;

pub use session::SessionManager;
pub use store::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
