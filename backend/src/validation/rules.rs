//! Common validation rules shared across request payloads.
//!
//! Rules only set an error code (and params). Human readable messages are
//! produced from the code when the errors are converted into the response
//! envelope.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};
use validator::{ValidateEmail, ValidationError};

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LENGTH: u64 = 8;

/// Fails with `required` when the value is empty or only whitespace.
pub fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// `required` first, then a syntactic email check.
pub fn validate_required_email(value: &str) -> Result<(), ValidationError> {
    validate_required(value)?;
    if !value.trim().validate_email() {
        return Err(ValidationError::new("email"));
    }
    Ok(())
}

/// `required`, then the minimum password length.
pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    validate_required(value)?;
    if (value.chars().count() as u64) < MIN_PASSWORD_LENGTH {
        let mut error = ValidationError::new("length");
        error.add_param(Cow::from("min"), &MIN_PASSWORD_LENGTH);
        return Err(error);
    }
    Ok(())
}

/// Absolute http(s) URL.
pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(ValidationError::new("url")),
    }
}

pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    if parse_date(value).is_none() {
        return Err(ValidationError::new("date"));
    }
    Ok(())
}

/// Parses a calendar date. A full RFC 3339 timestamp contributes its date part.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Error for a value outside a closed set.
pub fn invalid_choice() -> ValidationError {
    ValidationError::new("in")
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`). Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reads an optional integer from text input, mapping anything unparsable to
/// `None`.
pub fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.trim().parse().ok()))
}

/// An integer field that keeps a wrongly typed value so it can be reported
/// under the field's own key. Numeric strings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerInput {
    Integer(i64),
    NotInteger,
}

impl<'de> Deserialize<'de> for IntegerInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(number) => number.as_i64(),
            serde_json::Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        Ok(parsed.map_or(IntegerInput::NotInteger, IntegerInput::Integer))
    }
}

/// Checks `value` lies in `min..=max`, recording a message under `field`
/// otherwise.
pub fn check_integer(
    field: &str,
    value: IntegerInput,
    min: i64,
    max: i64,
    errors: &mut FieldErrors,
) -> Option<i64> {
    let label = field.replace('_', " ");
    match value {
        IntegerInput::NotInteger => {
            errors.add(field, format!("The {} field must be an integer.", label));
            None
        }
        IntegerInput::Integer(number) if number < min => {
            errors.add(field, format!("The {} field must be at least {}.", label, min));
            None
        }
        IntegerInput::Integer(number) if number > max => {
            errors.add(
                field,
                format!("The {} field must not be greater than {}.", label, max),
            );
            None
        }
        IntegerInput::Integer(number) => Some(number),
    }
}

/// Trims the value and maps an empty string to `None`.
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
