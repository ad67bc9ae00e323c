//! Failure taxonomy and backend error-body normalization
//!
//! Every error carries a message suitable for direct display. Failures that
//! originated from an HTTP response additionally preserve the status and
//! parsed body so callers can branch programmatically (for example, to show
//! field-level validation messages next to form inputs).
//!
//! The backend emits three error-body shapes: a validation array
//! (`{"detail": [{"loc": [...], "msg": "..."}]}`), a single detail
//! (`{"detail": "..."}`), or no usable body at all. They are parsed once,
//! here, into a closed set of variants; nothing downstream re-checks shapes.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// Errors surfaced to callers of the API client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request exceeded the per-attempt timeout budget.
    #[error("Request timeout. The server is taking too long to respond. Please try again.")]
    Timeout,

    /// The server could not be reached (connection refused, DNS, TLS).
    #[error("Unable to connect to server. Please make sure the backend server is reachable.")]
    Unreachable,

    /// No stored credentials at all; no network call was made.
    #[error("No authentication token found. Please login again.")]
    AuthRequired,

    /// A 401 survived one renewal-and-retry cycle, or renewal failed.
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// Field-level validation errors from the backend.
    #[error("{message}")]
    Validation {
        message: String,
        status: u16,
        data: Value,
    },

    /// Any other non-2xx response.
    #[error("{message}")]
    Http {
        message: String,
        status: u16,
        data: Value,
    },

    /// Client misconfiguration (builder errors).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("An unexpected error occurred. Please try again.")]
    Unexpected,
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of error-body shapes the backend produces.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Detail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Fields(Vec<FieldError>),
    Text(String),
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct FieldError {
    #[serde(default)]
    loc: Vec<Value>,
    msg: String,
}

impl FieldError {
    /// Render as `"<path>: <msg>"`, joining the location with dots.
    ///
    /// Location entries may be strings or array indices; both are rendered
    /// as-is.
    fn render(&self) -> String {
        let path = if self.loc.is_empty() {
            "field".to_string()
        } else {
            self.loc
                .iter()
                .map(|part| match part.as_str() {
                    Some(s) => s.to_string(),
                    None => part.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        };
        format!("{path}: {}", self.msg)
    }
}

impl Error {
    /// HTTP status, when the failure originated from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Validation { status, .. } | Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parsed response body, when the failure originated from a response.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Error::Validation { data, .. } | Error::Http { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Whether this failure means the session is gone and the user must
    /// authenticate again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::AuthRequired | Error::SessionExpired)
    }

    /// Map a transport-level send failure to the taxonomy.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() || err.is_request() {
            Error::Unreachable
        } else {
            Error::Unexpected
        }
    }

    /// Normalize a non-2xx response body into a display-ready error.
    ///
    /// Precedence: validation array, single detail, `HTTP <status>: <reason>`.
    pub(crate) fn from_response(status: StatusCode, body: Value) -> Self {
        let status_code = status.as_u16();
        let fallback = || {
            format!(
                "HTTP {status_code}: {}",
                status.canonical_reason().unwrap_or("Error")
            )
        };

        let parsed: ErrorBody =
            serde_json::from_value(body.clone()).unwrap_or(ErrorBody { detail: None });

        match parsed.detail {
            Some(Detail::Fields(fields)) => {
                let message = fields
                    .iter()
                    .map(FieldError::render)
                    .collect::<Vec<_>>()
                    .join(", ");
                if message.is_empty() {
                    Error::Http {
                        message: fallback(),
                        status: status_code,
                        data: body,
                    }
                } else {
                    Error::Validation {
                        message,
                        status: status_code,
                        data: body,
                    }
                }
            }
            Some(Detail::Text(message)) => Error::Http {
                message,
                status: status_code,
                data: body,
            },
            Some(Detail::Other(value)) => Error::Http {
                message: value.to_string(),
                status: status_code,
                data: body,
            },
            None => Error::Http {
                message: fallback(),
                status: status_code,
                data: body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_array_joins_field_messages() {
        let body = json!({
            "detail": [
                {"loc": ["body", "name"], "msg": "field required"},
                {"loc": ["body", "qty"], "msg": "value is not a valid integer"}
            ]
        });
        let err = Error::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(
            err.to_string(),
            "body.name: field required, body.qty: value is not a valid integer"
        );
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.status(), Some(422));
    }

    #[test]
    fn numeric_loc_entries_are_rendered() {
        let body = json!({
            "detail": [{"loc": ["body", "items", 0, "sku"], "msg": "field required"}]
        });
        let err = Error::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.to_string(), "body.items.0.sku: field required");
    }

    #[test]
    fn missing_loc_falls_back_to_field() {
        let body = json!({"detail": [{"msg": "broken"}]});
        let err = Error::from_response(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.to_string(), "field: broken");
    }

    #[test]
    fn string_detail_is_used_verbatim() {
        let body = json!({"detail": "Order not found"});
        let err = Error::from_response(StatusCode::NOT_FOUND, body);
        assert_eq!(err.to_string(), "Order not found");
        assert!(matches!(err, Error::Http { .. }));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn non_string_detail_is_stringified() {
        let body = json!({"detail": {"code": 7}});
        let err = Error::from_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), r#"{"code":7}"#);
    }

    #[test]
    fn empty_body_falls_back_to_status_line() {
        let err = Error::from_response(StatusCode::INTERNAL_SERVER_ERROR, json!({}));
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
    }

    #[test]
    fn empty_validation_array_falls_back_to_status_line() {
        let body = json!({"detail": []});
        let err = Error::from_response(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "HTTP 400: Bad Request");
    }

    #[test]
    fn response_data_is_preserved_for_branching() {
        let body = json!({"detail": "Duplicate order number"});
        let err = Error::from_response(StatusCode::CONFLICT, body.clone());
        assert_eq!(err.data(), Some(&body));
    }

    #[test]
    fn transport_errors_carry_no_status() {
        assert_eq!(Error::Timeout.status(), None);
        assert_eq!(Error::Unreachable.status(), None);
        assert!(Error::Timeout.data().is_none());
    }

    #[test]
    fn auth_errors_are_flagged() {
        assert!(Error::AuthRequired.is_auth());
        assert!(Error::SessionExpired.is_auth());
        assert!(!Error::Timeout.is_auth());
    }
}
