//! Data models shared across database access and API handlers.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::validation::rules;

/// Implements `FromStr`, `Display` and a TEXT column mapping for a closed enum
/// that already provides `as_str` and `ALL`.
macro_rules! text_enum {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str() == s)
                    .ok_or_else(|| format!("unknown {} value: {}", stringify!($name), s))
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                raw.parse::<$name>().map_err(Into::into)
            }
        }
    };
}

pub(crate) use text_enum;

pub mod password_reset;
pub mod photo;
pub mod profile;
pub mod race_result;
pub mod session;
pub mod user;

/// Query parameters for page-numbered endpoints. Values that are not
/// integers are ignored and fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// 1-based page number (default: 1).
    #[serde(default, deserialize_with = "rules::lenient_integer")]
    pub page: Option<i64>,
    /// Requested page size. Only honoured where the endpoint allows it.
    #[serde(default, deserialize_with = "rules::lenient_integer")]
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PageMeta {
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageMeta {
    pub fn new(current_page: i64, per_page: i64, total: i64) -> Self {
        let per_page = per_page.max(1);
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            current_page,
            last_page,
            per_page,
            total,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.current_page - 1).saturating_mul(self.per_page)
    }
}

/// One page of records together with its metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// Success envelope: `{"success": true, "data": ..., "message": ..., "meta": ...}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_not_verified: Option<bool>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: None,
            email_not_verified: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_meta(mut self, meta: PageMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: None,
            email_not_verified: None,
        }
    }
}

impl<T> From<Page<T>> for ApiResponse<Vec<T>> {
    fn from(page: Page<T>) -> Self {
        ApiResponse::data(page.items).with_meta(page.meta)
    }
}
