use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    store::PersistenceError,
    users::{password::PasswordError, schema::FieldError},
};

/// Every failure a handler can produce. Rendered as
/// `{"status":"error","message":...,"details":[...]}` with a matching status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Body was not parseable JSON or had the wrong content type.
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("request validation failed")]
    Validation(Vec<FieldError>),
    #[error("{action}: password processing failed")]
    Hashing {
        action: &'static str,
        #[source]
        source: PasswordError,
    },
    #[error("{action}: {source}")]
    Persistence {
        action: &'static str,
        #[source]
        source: PersistenceError,
    },
    #[error("invalid credentials")]
    Unauthorized,
}

impl AppError {
    pub fn hashing(action: &'static str, source: PasswordError) -> Self {
        Self::Hashing { action, source }
    }

    pub fn persistence(action: &'static str, source: PersistenceError) -> Self {
        Self::Persistence { action, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Hashing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Persistence { source, .. } => match source {
                PersistenceError::Conflict(_) => StatusCode::CONFLICT,
                PersistenceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PersistenceError::Rejected(_) | PersistenceError::Unavailable(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let details = match self {
            AppError::Validation(fields) => Some(fields),
            _ => None,
        };
        let body = Json(ErrorBody {
            status: "error",
            message,
            details,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn persistence_errors_map_to_distinct_statuses() {
        let conflict = AppError::persistence(
            "user not created",
            PersistenceError::Conflict("email already registered".into()),
        );
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            conflict.to_string(),
            "user not created: record already exists: email already registered"
        );

        let timeout = AppError::persistence(
            "user not created",
            PersistenceError::Timeout(Duration::from_secs(10)),
        );
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let down = AppError::persistence(
            "user not created",
            PersistenceError::Unavailable("connection refused".into()),
        );
        assert_eq!(down.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn hashing_error_hides_detail() {
        let err = AppError::hashing("user not created", PasswordError::Hash("boom".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "user not created: password processing failed");
    }

    #[test]
    fn validation_body_carries_field_details() {
        let err = AppError::Validation(vec![FieldError::new("password", "is required")]);
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = ErrorBody {
            status: "error",
            message: err.to_string(),
            details: match err {
                AppError::Validation(f) => Some(f),
                _ => None,
            },
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["details"][0]["field"], "password");
        assert_eq!(json["details"][0]["message"], "is required");
    }
}
