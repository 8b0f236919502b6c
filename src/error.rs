use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ArtshareError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("OAuth flow error: {0}")]
    OauthFlowError(String),

    #[error("GitHub account is not linked to the user with this email")]
    AccountNotLinked,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("parent comment belongs to a different artwork")]
    InvalidParentComment,

    #[error("an artwork takes at most 3 images besides the main one, got {0}")]
    TooManyImages(usize),

    #[error("a profile cannot follow itself")]
    SelfFollow,

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),
}

impl ArtshareError {
    /// SQLSTATE 23505.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ArtshareError::DatabaseError(e) => e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            _ => false,
        }
    }

    /// SQLSTATE 23503.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            ArtshareError::DatabaseError(e) => e
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation()),
            _ => false,
        }
    }

    /// Transient network failures and upstream 5xx/429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ArtshareError::Reqwest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            _ => false,
        }
    }

    /// Error kind reported on the sign-in page (`/auth?error=...`).
    pub fn auth_error_kind(&self) -> &'static str {
        match self {
            ArtshareError::AccountNotLinked => "OAuthAccountNotLinked",
            ArtshareError::OauthFlowError(_) => "OAuthCallbackError",
            ArtshareError::Oauth2Token(_) | ArtshareError::Oauth2Server { .. } => "OAuthSignin",
            ArtshareError::Reqwest(_) | ArtshareError::UrlParse(_) | ArtshareError::Json(_) => {
                "OAuthProfileError"
            }
            _ => "Configuration",
        }
    }
}

impl From<figment::Error> for ArtshareError {
    fn from(e: figment::Error) -> Self {
        ArtshareError::Config(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for ArtshareError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => ArtshareError::Oauth2Server {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(req_e) => {
                ArtshareError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                ArtshareError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => ArtshareError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for ArtshareError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            e if e.is_unique_violation() => (
                StatusCode::CONFLICT,
                "CONFLICT",
                "Resource already exists.",
            ),
            e if e.is_foreign_key_violation() => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_REFERENCE",
                "Referenced resource does not exist.",
            ),
            ArtshareError::DatabaseError(_) | ArtshareError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.",
            ),
            ArtshareError::Json(_)
            | ArtshareError::Oauth2Token(_)
            | ArtshareError::Oauth2Server { .. }
            | ArtshareError::OauthFlowError(_)
            | ArtshareError::AccountNotLinked => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication error.",
            ),
            ArtshareError::Reqwest(_) | ArtshareError::UrlParse(_) => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "Upstream service is unavailable.",
            ),
            ArtshareError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found.",
            ),
            ArtshareError::InvalidParentComment
            | ArtshareError::SelfFollow
            | ArtshareError::TooManyImages(_) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Request violates a data rule.",
            ),
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message: message.to_string(),
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(
            ArtshareError::SelfFollow.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ArtshareError::NotFound("artwork").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ArtshareError::AccountNotLinked.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ArtshareError::TooManyImages(4).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn row_not_found_is_not_a_constraint_violation() {
        let err = ArtshareError::from(SqlxError::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn auth_error_kind_names_account_linking() {
        assert_eq!(
            ArtshareError::AccountNotLinked.auth_error_kind(),
            "OAuthAccountNotLinked"
        );
    }
}
