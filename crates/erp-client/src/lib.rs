//! HTTP client for the ERP backend
//!
//! Moves bytes reliably between the UI and the backend under token expiry
//! and network instability. The pieces:
//!
//! 1. Verb methods (`get`/`post`/`put`/`patch`/`delete`) serialize the body
//!    and apply per-verb conventions
//! 2. The executor attaches the bearer token, renewing when only a refresh
//!    token is stored, and bounds every attempt with a timeout
//! 3. A 401 on an authenticated call triggers one coordinated renewal and
//!    one retry; concurrent expiries share a single renewal request
//! 4. Failures are normalized into display-ready errors that preserve the
//!    HTTP status and body for programmatic branching
//!
//! Consumers see [`ApiClient`], its builder, and [`Error`]; renewal
//! coordination and request execution stay internal.

mod context;
mod refresh;

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::{Error, Result};
