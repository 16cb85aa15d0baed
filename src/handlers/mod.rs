pub mod categories;
pub mod category_items;
pub mod gallery;
pub mod issuances;
pub mod items;
pub mod stock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

/// JSON body extractor whose rejections use the API error envelope.
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// Success envelope: `{ success: true, message?, data?, count? }`.
pub struct ApiResponse<T> {
    status: StatusCode,
    message: Option<String>,
    data: Option<T>,
    count: Option<usize>,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            data: Some(data),
            count: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self::ok(data).count(count)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message: self.message.as_deref(),
            data: self.data.as_ref(),
            count: self.count,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ItemIdRequest {
    pub item_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct EventIdRequest {
    pub event_id: Option<i32>,
}

/// Unwraps a required request field, failing with `message`.
pub fn required<T>(value: Option<T>, message: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::Validation(message.to_string()))
}

/// Keeps an explicit `null` apart from an absent field: use with
/// `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`, where `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_responses_carry_a_count() {
        let response = ApiResponse::list(vec![1, 2, 3]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "data": [1, 2, 3], "count": 3})
        );
    }

    #[tokio::test]
    async fn created_responses_use_201_and_a_message() {
        let response = ApiResponse::created(json!({"id": 1}))
            .message("Category created successfully")
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            json!({"success": true, "message": "Category created successfully", "data": {"id": 1}})
        );
    }

    #[test]
    fn required_reports_the_given_message() {
        match required::<i32>(None, "Item ID is required") {
            Err(AppError::Validation(message)) => assert_eq!(message, "Item ID is required"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
