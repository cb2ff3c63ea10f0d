//! Authentication error responses.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;

/// Why a protected request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No bearer token was presented.
    NotAuthenticated,
    /// The token failed to parse or the principal failed re-validation.
    Rejected(AuthError),
}

/// API authentication errors (returns JSON).
#[derive(Debug)]
pub struct ApiAuthError(pub AuthErrorKind);

impl From<AuthError> for ApiAuthError {
    fn from(e: AuthError) -> Self {
        Self(AuthErrorKind::Rejected(e))
    }
}

impl ApiAuthError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AuthErrorKind::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AuthErrorKind::Rejected(AuthError::AuthRejected(_)) => StatusCode::FORBIDDEN,
            AuthErrorKind::Rejected(AuthError::StoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthErrorKind::Rejected(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> &'static str {
        match &self.0 {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::Rejected(e) => match e {
                AuthError::TokenExpired => "Token expired",
                AuthError::TokenSignatureInvalid => "Invalid token signature",
                AuthError::TokenUnsupported => "Unsupported token",
                AuthError::TokenClaimsInvalid => "Invalid token claims",
                AuthError::AuthRejected(_) => "Account disabled",
                AuthError::StoreUnavailable(_) => "Service unavailable",
                _ => "Invalid token",
            },
        }
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let status = self.status_code();
        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}
