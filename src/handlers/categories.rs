use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{required, ApiResponse, IdRequest, JsonBody},
    models::{category, Category},
};

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub id: Option<i32>,
    pub name: Option<String>,
}

fn category_name(name: Option<String>) -> AppResult<String> {
    let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    required(name, "Category name is required")
}

pub async fn create_category(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<CategoryRequest>,
) -> AppResult<ApiResponse<Category>> {
    let name = category_name(req.name)?;
    let category = category::create_category(&db, &name).await?;
    Ok(ApiResponse::created(category).message("Category created successfully"))
}

pub async fn list_categories(State(db): State<Database>) -> AppResult<ApiResponse<Vec<Category>>> {
    let categories = category::list_categories(&db).await?;
    Ok(ApiResponse::list(categories))
}

pub async fn get_category(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<Category>> {
    let id = required(req.id, "Category ID is required")?;
    let category = category::get_category(&db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::ok(category))
}

pub async fn update_category(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<CategoryRequest>,
) -> AppResult<ApiResponse<Category>> {
    let id = required(req.id, "Category ID is required")?;
    let name = category_name(req.name)?;
    let category = category::update_category(&db, id, &name)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::ok(category).message("Category updated successfully"))
}

pub async fn delete_category(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<Category>> {
    let id = required(req.id, "Category ID is required")?;
    let category = category::delete_category(&db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::ok(category).message("Category deleted successfully"))
}
