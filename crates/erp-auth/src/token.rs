//! Token renewal wire call
//!
//! One interaction: POST the stored refresh token to the renewal endpoint
//! and receive a fresh pair. Any non-2xx status or malformed body counts as
//! a renewal failure; a 401/403 specifically means the refresh token itself
//! was rejected.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Path of the renewal endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Success body from the renewal endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchange a refresh token for a new token pair.
///
/// `base_url` is the configured API base (no trailing slash); the renewal
/// endpoint lives at `{base_url}/auth/refresh`. The caller decides what to
/// do on failure; this function never touches stored credentials.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(format!("{base_url}{REFRESH_PATH}"))
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token renewal request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or invalid
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenRenewal(format!(
            "renewal endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenRenewal(format!("invalid renewal response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn token_response_deserializes() {
        let json = r#"{"access_token":"at_abc","refresh_token":"rt_def"}"#;
        let tokens: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "at_abc");
        assert_eq!(tokens.refresh_token, "rt_def");
    }

    #[test]
    fn refresh_request_serializes_expected_body() {
        let json = serde_json::to_string(&RefreshRequest {
            refresh_token: "rt_1",
        })
        .unwrap();
        assert_eq!(json, r#"{"refresh_token":"rt_1"}"#);
    }

    #[tokio::test]
    async fn successful_renewal_returns_new_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(serde_json::json!({"refresh_token": "rt_1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_2",
                "refresh_token": "rt_2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let tokens = refresh_token(&client, &server.uri(), "rt_1").await.unwrap();
        assert_eq!(tokens.access_token, "at_2");
        assert_eq!(tokens.refresh_token, "rt_2");
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = refresh_token(&client, &server.uri(), "rt_revoked")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn server_error_is_renewal_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = refresh_token(&client, &server.uri(), "rt_1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenRenewal(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_body_is_renewal_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "wrong"})),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let err = refresh_token(&client, &server.uri(), "rt_1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenRenewal(_)), "got {err:?}");
    }
}
