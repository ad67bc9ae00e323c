//! ERP session credential library
//!
//! Provides file-backed storage for the session token pair and the renewal
//! wire call against the backend. This crate is a standalone library with
//! no dependency on the client crate — it can be tested and used
//! independently.
//!
//! Credential flow:
//! 1. Login stores the initial pair via `CredentialStore::set_pair()`
//! 2. The client reads the access token on every authenticated request
//! 3. On expiry, `token::refresh_token()` exchanges the refresh token
//! 4. The renewed pair is saved via `CredentialStore::set_pair()`
//! 5. Renewal failure or logout drops both tokens via `CredentialStore::clear()`

pub mod credentials;
pub mod error;
pub mod token;

pub use credentials::{CredentialStore, TokenPair};
pub use error::{Error, Result};
pub use token::{REFRESH_PATH, TokenResponse, refresh_token};
