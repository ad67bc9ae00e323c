//! Per-call request description

use reqwest::Method;
use serde_json::Value;

/// Everything the executor needs to issue one attempt of a call.
///
/// Constructed once per logical call and never mutated; the retried attempt
/// reuses the same context with a renewed token and a fresh timeout budget.
#[derive(Debug)]
pub(crate) struct RequestContext {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Attach a bearer token before sending.
    pub requires_auth: bool,
    /// Session probe: a terminal 401 is data, not an error.
    pub probe: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: None,
            requires_auth: true,
            probe: false,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn probe(mut self) -> Self {
        self.probe = true;
        self
    }
}
