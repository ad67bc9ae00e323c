//! Authenticated API client: executor, retry policy, verb facade
//!
//! Control flow for one call:
//! 1. A verb method builds a [`RequestContext`] and hands it to `dispatch`
//! 2. The executor attaches the bearer token (renewing once if only a
//!    refresh token is stored) and sends the request with the per-attempt
//!    timeout
//! 3. A 401 on an authenticated call triggers one coordinated renewal and
//!    one retry; a second 401 clears the session and is fatal
//! 4. Non-2xx bodies are normalized into display-ready errors
//!
//! Page code sees only the verb methods, the session helpers, and `Error`;
//! the coordinator and executor stay internal.

use std::sync::Arc;
use std::time::Duration;

use erp_auth::CredentialStore;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::refresh::RefreshCoordinator;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const LOGIN_PATH: &str = "/auth/login";
const CURRENT_USER_PATH: &str = "/auth/me";

/// Outcome of the dispatch state machine.
///
/// `Unauthenticated` is only produced for session-probe calls, where a
/// terminal 401 is data rather than an error.
enum Dispatched {
    Response(Response),
    Unauthenticated,
}

/// Client for the ERP backend.
///
/// Cheap to share behind an `Arc`; every instance owns its own renewal
/// coordination state, so independent clients never serialize each other's
/// renewals.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    /// Start building a new client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    // Verb facade --------------------------------------------------------

    /// Authenticated GET returning the parsed response body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let ctx = RequestContext::new(Method::GET, path);
        let response = expect_response(self.dispatch(&ctx).await?);
        self.finalize(response).await
    }

    /// POST with a JSON body.
    ///
    /// `requires_auth` is explicit because POST is the one verb with mixed
    /// usage: login has no token yet, business creates do.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        requires_auth: bool,
    ) -> Result<T> {
        let ctx = RequestContext::new(Method::POST, path)
            .body(to_body(body)?)
            .requires_auth(requires_auth);
        let response = expect_response(self.dispatch(&ctx).await?);
        self.finalize(response).await
    }

    /// Authenticated PUT with a JSON body.
    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let ctx = RequestContext::new(Method::PUT, path).body(to_body(body)?);
        let response = expect_response(self.dispatch(&ctx).await?);
        self.finalize(response).await
    }

    /// Authenticated PATCH with a JSON body.
    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let ctx = RequestContext::new(Method::PATCH, path).body(to_body(body)?);
        let response = expect_response(self.dispatch(&ctx).await?);
        self.finalize(response).await
    }

    /// Authenticated DELETE with an optional JSON body.
    ///
    /// A 204 or an empty body is a non-error empty result (`Value::Null`).
    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<Value> {
        let mut ctx = RequestContext::new(Method::DELETE, path);
        if let Some(body) = body {
            ctx = ctx.body(body);
        }
        let response = expect_response(self.dispatch(&ctx).await?);
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        if !status.is_success() {
            return Err(self.error_from(response).await);
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    // Session helpers ----------------------------------------------------

    /// Authenticate and persist the returned token pair.
    ///
    /// Returns the full login response body (it usually carries the user
    /// record alongside the tokens).
    pub async fn login(&self, credentials: &impl Serialize) -> Result<Value> {
        let body: Value = self.post(LOGIN_PATH, credentials, false).await?;
        let access = body.get("access_token").and_then(Value::as_str);
        let refresh = body.get("refresh_token").and_then(Value::as_str);
        if let (Some(access), Some(refresh)) = (access, refresh) {
            if let Err(e) = self.store.set_pair(access, refresh).await {
                warn!(error = %e, "failed to persist session tokens");
            }
        }
        Ok(body)
    }

    /// Drop the stored session.
    pub async fn logout(&self) {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored tokens");
        }
    }

    /// Probe the current session.
    ///
    /// Resolves with `Ok(None)` when the backend rejects the session (a
    /// terminal 401) or when no session is stored at all, so app boot can
    /// check for a logged-in user without surfacing an error. Transport and
    /// other HTTP failures still propagate.
    pub async fn current_user<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let ctx = RequestContext::new(Method::GET, CURRENT_USER_PATH).probe();
        match self.dispatch(&ctx).await {
            Ok(Dispatched::Unauthenticated) => Ok(None),
            Ok(Dispatched::Response(response)) => self.finalize(response).await.map(Some),
            Err(Error::AuthRequired) | Err(Error::SessionExpired) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // Retry policy -------------------------------------------------------

    /// Run one call through the attach, execute, renew, retry state machine.
    ///
    /// At most one retry per logical call: the retried attempt's 401 goes
    /// straight to the terminal branch. Renewal is delegated to the
    /// coordinator, which guarantees one renewal request per batch of
    /// concurrently expiring calls; the renewal wire call never passes
    /// through here, so a 401 from the renewal endpoint cannot recurse.
    async fn dispatch(&self, ctx: &RequestContext) -> Result<Dispatched> {
        let response = self.execute(ctx, None).await?;
        if !ctx.requires_auth || response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Dispatched::Response(response));
        }

        let Some(token) = self.refresher.refresh().await else {
            // Renewal failed or no refresh token; the coordinator already
            // cleared the stored pair on failure.
            return self.terminal_unauthorized(ctx).await;
        };

        debug!(path = %ctx.path, "retrying request with renewed token");
        let retried = self.execute(ctx, Some(&token)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return self.terminal_unauthorized(ctx).await;
        }
        Ok(Dispatched::Response(retried))
    }

    /// A 401 with no retry budget left: clear the session and surface the
    /// failure, except on the session probe where "not authenticated" is
    /// data.
    async fn terminal_unauthorized(&self, ctx: &RequestContext) -> Result<Dispatched> {
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored tokens");
        }
        if ctx.probe {
            Ok(Dispatched::Unauthenticated)
        } else {
            Err(Error::SessionExpired)
        }
    }

    // Executor -----------------------------------------------------------

    /// Issue one attempt: build headers, resolve a token if required, send.
    ///
    /// Each attempt gets its own timeout budget from the underlying client;
    /// a timed-out attempt is cancelled and surfaced as `Error::Timeout`.
    async fn execute(&self, ctx: &RequestContext, token_override: Option<&str>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, ctx.path);
        let mut request = self
            .http
            .request(ctx.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &ctx.body {
            request = request.json(body);
        }

        if ctx.requires_auth {
            let token = match token_override {
                Some(token) => token.to_string(),
                None => self.resolve_token().await?,
            };
            request = request.bearer_auth(token);
        }

        debug!(method = %ctx.method, %url, "sending request");
        let response = request.send().await.map_err(Error::from_transport)?;
        debug!(method = %ctx.method, %url, status = %response.status(), "received response");
        Ok(response)
    }

    /// Current access token, renewing once when only a refresh token is
    /// stored. Fails fast without a network call when no renewal is
    /// possible.
    async fn resolve_token(&self) -> Result<String> {
        if let Some(token) = self.store.access().await {
            return Ok(token);
        }
        if self.store.refresh_token().await.is_none() {
            return Err(Error::AuthRequired);
        }
        self.refresher.refresh().await.ok_or(Error::SessionExpired)
    }

    // Finalization -------------------------------------------------------

    /// Parse a success body, or normalize a non-2xx response into an error.
    async fn finalize<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        if response.status().is_success() {
            return response.json::<T>().await.map_err(|_| Error::Unexpected);
        }
        Err(self.error_from(response).await)
    }

    async fn error_from(&self, response: Response) -> Error {
        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or_else(|_| Value::Object(Default::default()));
        Error::from_response(status, body)
    }
}

fn to_body(body: &impl Serialize) -> Result<Value> {
    serde_json::to_value(body).map_err(|_| Error::Unexpected)
}

/// Non-probe dispatches always carry a response.
fn expect_response(dispatched: Dispatched) -> Response {
    match dispatched {
        Dispatched::Response(response) => response,
        Dispatched::Unauthenticated => unreachable!("probe outcome on a non-probe call"),
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    store: Option<Arc<CredentialStore>>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            store: None,
        }
    }
}

impl ApiClientBuilder {
    /// API base URL, e.g. `https://erp.example.com/api/v1`. Required.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-attempt timeout. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Credential store holding the session token pair. Required.
    pub fn credentials(mut self, store: Arc<CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".into()))?
            .trim_end_matches('/')
            .to_string();
        let store = self
            .store
            .ok_or_else(|| Error::Config("credential store is required".into()))?;
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("building http client: {e}")))?;
        let refresher =
            RefreshCoordinator::new(http.clone(), base_url.clone(), Arc::clone(&store));
        Ok(ApiClient {
            http,
            base_url,
            store,
            refresher,
        })
    }
}
