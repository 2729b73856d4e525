use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{error::AppError, state::AppState};

use super::{
    dto::{LoginResponse, MessageResponse, PublicUser},
    schema::{check_registration, FieldError, LoginRequest, RegisterRequest},
    services,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

fn read_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(rejection) => {
            warn!(status = %rejection.status(), "unreadable request body");
            Err(AppError::MalformedBody(rejection.body_text()))
        }
    }
}

fn invalid(endpoint: &'static str, errors: Vec<FieldError>) -> AppError {
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    warn!(endpoint, ?fields, outcome = "invalid", "request rejected");
    AppError::Validation(errors)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let body = read_body(payload)?;
    let req = RegisterRequest::from_json(&body).map_err(|e| invalid("register", e))?;
    check_registration(&state.config.validation, &req).map_err(|e| invalid("register", e))?;

    services::register_user(&state, req).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::success("user created"))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let body = read_body(payload)?;
    let req = LoginRequest::from_json(&body).map_err(|e| invalid("login", e))?;

    let user = services::authenticate(&state, req).await?;

    Ok(Json(LoginResponse {
        status: "success",
        message: "login successful".into(),
        user: PublicUser {
            username: user.username,
            email: user.email,
        },
    }))
}
