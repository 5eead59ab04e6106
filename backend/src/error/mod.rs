use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::multipart::MultipartRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

/// Field-keyed error messages, serialised as `{ "field": ["message", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns `Err(AppError::Validation)` when any message was collected.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub errors: FieldErrors,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("unauthorized: {0:?}")]
    Unauthorized(FieldErrors),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0:?}")]
    NotFound(FieldErrors),
    #[error("conflict: {0:?}")]
    Conflict(FieldErrors),
    #[error("rate limited: {0:?}")]
    RateLimited(FieldErrors),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }

    pub fn unauthorized(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Unauthorized(FieldErrors::single(field, message))
    }

    pub fn unauthenticated() -> Self {
        Self::unauthorized("auth", "Unauthenticated.")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::NotFound(FieldErrors::single(field, message))
    }

    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict(FieldErrors::single(field, message))
    }

    pub fn rate_limited(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::RateLimited(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) | AppError::RateLimited(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let errors = match self {
            AppError::Validation(errors)
            | AppError::Unauthorized(errors)
            | AppError::NotFound(errors)
            | AppError::Conflict(errors)
            | AppError::RateLimited(errors) => errors,
            AppError::Forbidden(message) => FieldErrors::single("auth", message),
            AppError::Internal(err) => {
                tracing::error!("Internal server error: {:?}", err);
                FieldErrors::single("server", "Internal server error")
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            errors,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::not_found("resource", "Resource not found."),
            _ => AppError::Internal(err.into()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        collect_validation_errors(&errors, None, &mut fields);
        AppError::Validation(fields)
    }
}

/// Flattens validator errors into `out`, prefixing nested keys with `prefix.`.
pub fn collect_validation_errors(
    errors: &ValidationErrors,
    prefix: Option<&str>,
    out: &mut FieldErrors,
) {
    for (field, kind) in errors.errors() {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| default_message(&key, error));
                    out.add(key.clone(), message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_errors(nested, Some(&key), out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    let indexed = format!("{}.{}", key, index);
                    collect_validation_errors(nested, Some(&indexed), out);
                }
            }
        }
    }
}

/// Renders a message from the error code and params, using the last segment of
/// the field key with underscores as spaces (`social_links.strava` -> `strava`).
fn default_message(key: &str, error: &ValidationError) -> String {
    let label = key.rsplit('.').next().unwrap_or(key).replace('_', " ");
    let number = |name: &str| error.params.get(name).and_then(|v| v.as_f64());
    let value = number("value");
    let below_min = |min: f64| value.map_or(true, |v| v < min);
    let above_max = |max: f64| value.map_or(true, |v| v > max);

    match error.code.as_ref() {
        "required" => format!("The {} field is required.", label),
        "email" => format!("The {} field must be a valid email address.", label),
        "url" => format!("The {} field must be a valid URL.", label),
        "date" => format!("The {} field must be a valid date.", label),
        "in" => format!("The selected {} is invalid.", label),
        "must_match" => format!("The {} field confirmation does not match.", label),
        "unique" => format!("The {} has already been taken.", label),
        "length" => match (number("min"), number("max")) {
            (Some(min), _) if below_min(min) => format!(
                "The {} field must be at least {} characters.",
                label,
                display_number(min)
            ),
            (_, Some(max)) if above_max(max) => format!(
                "The {} field must not be greater than {} characters.",
                label,
                display_number(max)
            ),
            _ => format!("The {} field has an invalid length.", label),
        },
        "range" => match (number("min"), number("max")) {
            (Some(min), _) if below_min(min) => {
                format!("The {} field must be at least {}.", label, display_number(min))
            }
            (_, Some(max)) if above_max(max) => format!(
                "The {} field must not be greater than {}.",
                label,
                display_number(max)
            ),
            _ => format!("The {} field is out of range.", label),
        },
        _ => format!("The {} field is invalid.", label),
    }
}

fn display_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::not_found("resource", "Resource not found.")
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::validation("photos", rejection.body_text())
    }
}
