use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient stock for item {item_id}: {current} available, {requested} requested")]
    InsufficientStock {
        item_id: i32,
        current: Decimal,
        requested: Decimal,
    },

    #[error("Invalid category ID: {0}")]
    InvalidCategory(i32),

    #[error("Invalid quantity value provided")]
    InvalidQuantity,

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InsufficientStock { .. }
            | Self::InvalidCategory(_)
            | Self::InvalidQuantity => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to the client. Server-side failures are reduced to a
    /// generic string; the detail only goes to the log.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::InsufficientStock { .. } => "Insufficient stock for this transaction".to_string(),
            _ => self.to_string(),
        }
    }
}

impl AppError {
    /// Client-facing error for a Postgres SQLSTATE, when the code describes a
    /// problem with the request rather than with the server.
    fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            // foreign_key_violation
            "23503" => Some(AppError::Conflict(
                "Record is still referenced by other data".to_string(),
            )),
            // unique_violation
            "23505" => Some(AppError::Conflict("Record already exists".to_string())),
            // check_violation
            "23514" => Some(AppError::Validation(
                "Value violates a data constraint".to_string(),
            )),
            // numeric_value_out_of_range
            "22003" => Some(AppError::InvalidQuantity),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("Record not found".to_string());
        }
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(mapped) = db_err.code().as_deref().and_then(AppError::from_sqlstate) {
                return mapped;
            }
        }
        AppError::Database(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }

        let body = match &self {
            AppError::InsufficientStock {
                current, requested, ..
            } => json!({
                "success": false,
                "error": self.response_message(),
                "current_stock": current,
                "requested_quantity": requested,
                "message": "Cannot issue more items than currently available in stock",
            }),
            _ => json!({
                "success": false,
                "error": self.response_message(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn maps_error_kinds_to_status_codes() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("Item").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InsufficientStock {
                item_id: 1,
                current: dec(5),
                requested: dec(6)
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidCategory(9).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn hides_internal_details_from_clients() {
        let err = AppError::Internal("connection reset by peer".into());
        assert_eq!(err.response_message(), "Internal server error");
    }

    #[test]
    fn constraint_violations_are_client_errors() {
        let check = AppError::from_sqlstate("23514").unwrap();
        assert!(matches!(check, AppError::Validation(_)));
        assert_eq!(check.status_code(), StatusCode::BAD_REQUEST);

        assert!(matches!(
            AppError::from_sqlstate("22003"),
            Some(AppError::InvalidQuantity)
        ));
        assert_eq!(
            AppError::from_sqlstate("23503").unwrap().status_code(),
            StatusCode::CONFLICT
        );
        assert!(AppError::from_sqlstate("40001").is_none());
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn insufficient_stock_body_carries_quantities() {
        let response = AppError::InsufficientStock {
            item_id: 3,
            current: dec(4),
            requested: dec(10),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["current_stock"], "4");
        assert_eq!(body["requested_quantity"], "10");
    }
}
