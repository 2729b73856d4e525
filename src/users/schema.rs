use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ValidationConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Body of `POST /register`. `Debug` prints the password as `[REDACTED]`.
#[derive(Debug)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

/// Body of `POST /login`.
#[derive(Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret<String>,
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, Vec<FieldError>> {
    value
        .as_object()
        .ok_or_else(|| vec![FieldError::new("body", "must be a JSON object")])
}

fn string_field(obj: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<String> {
    match obj.get(name) {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(name, "is required"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(FieldError::new(name, "must be a string"));
            None
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl RegisterRequest {
    /// Checks presence and type of every field, reporting all problems at once.
    pub fn from_json(value: &Value) -> Result<Self, Vec<FieldError>> {
        let obj = as_object(value)?;
        let mut errors = Vec::new();
        let username = string_field(obj, "username", &mut errors);
        let email = string_field(obj, "email", &mut errors);
        let password = string_field(obj, "password", &mut errors);

        match (username, email, password) {
            (Some(username), Some(email), Some(password)) if errors.is_empty() => Ok(Self {
                username: username.trim().to_string(),
                email: normalize_email(&email),
                password: Secret::new(password),
            }),
            _ => Err(errors),
        }
    }
}

impl LoginRequest {
    pub fn from_json(value: &Value) -> Result<Self, Vec<FieldError>> {
        let obj = as_object(value)?;
        let mut errors = Vec::new();
        let email = string_field(obj, "email", &mut errors);
        let password = string_field(obj, "password", &mut errors);

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Self {
                email: normalize_email(&email),
                password: Secret::new(password),
            }),
            _ => Err(errors),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_complex(password: &str) -> bool {
    password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Applies the configured content rules to a structurally valid request.
pub fn check_registration(
    rules: &ValidationConfig,
    req: &RegisterRequest,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    let username_len = req.username.chars().count();
    if username_len == 0 {
        errors.push(FieldError::new("username", "must not be empty"));
    } else if username_len < rules.min_username_len {
        errors.push(FieldError::new(
            "username",
            format!("must be at least {} characters", rules.min_username_len),
        ));
    }

    if req.email.is_empty() {
        errors.push(FieldError::new("email", "must not be empty"));
    } else if rules.require_email_shape && !is_valid_email(&req.email) {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }

    let password = req.password.expose_secret();
    let password_len = password.chars().count();
    if password_len == 0 {
        errors.push(FieldError::new("password", "must not be empty"));
    } else if password_len < rules.min_password_len {
        errors.push(FieldError::new(
            "password",
            format!("must be at least {} characters", rules.min_password_len),
        ));
    } else if rules.require_password_complexity && !is_complex(password) {
        errors.push(FieldError::new(
            "password",
            "must contain a lowercase letter, an uppercase letter and a digit",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
