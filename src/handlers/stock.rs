use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{required, ApiResponse, ItemIdRequest, JsonBody},
    models::{
        stock::{self, StockOverview},
        Stock,
    },
};

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub item_id: Option<i32>,
    pub quantity_available: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct StockBalance {
    pub item_id: i32,
    pub quantity_available: Decimal,
}

fn parse_stock_request(req: StockRequest) -> AppResult<(i32, Decimal)> {
    let (item_id, quantity) = match (req.item_id, req.quantity_available) {
        (Some(item_id), Some(quantity)) => (item_id, quantity),
        _ => {
            return Err(AppError::Validation(
                "Item ID and quantity are required".to_string(),
            ))
        }
    };
    if quantity.is_sign_negative() {
        return Err(AppError::Validation(
            "Quantity must be a non-negative number".to_string(),
        ));
    }
    Ok((item_id, stock::ensure_storable(quantity)?))
}

pub async fn create_stock(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<StockRequest>,
) -> AppResult<ApiResponse<Stock>> {
    let (item_id, quantity) = parse_stock_request(req)?;
    let stock = stock::create_stock(&db, item_id, quantity).await?;
    Ok(ApiResponse::created(stock).message("Stock created successfully"))
}

pub async fn get_stock(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<ItemIdRequest>,
) -> AppResult<ApiResponse<Stock>> {
    let item_id = required(req.item_id, "Item ID is required")?;
    let stock = stock::find_stock(&db, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock not found for this item".to_string()))?;
    Ok(ApiResponse::ok(stock))
}

/// Absolute correction of a balance, outside the issuance ledger.
pub async fn update_stock(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<StockRequest>,
) -> AppResult<ApiResponse<Stock>> {
    let (item_id, quantity) = parse_stock_request(req)?;
    let stock = stock::update_stock(&db, item_id, quantity)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock not found for this item".to_string()))?;
    log::info!("stock of item {} set to {}", item_id, quantity);
    Ok(ApiResponse::ok(stock).message("Stock updated successfully"))
}

pub async fn list_stock(State(db): State<Database>) -> AppResult<ApiResponse<Vec<StockOverview>>> {
    let stock = stock::list_stock(&db).await?;
    Ok(ApiResponse::list(stock))
}

pub async fn stock_balance(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<ItemIdRequest>,
) -> AppResult<ApiResponse<StockBalance>> {
    let item_id = required(req.item_id, "Item ID is required")?;
    let stock = stock::find_stock(&db, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock not found for this item".to_string()))?;
    Ok(ApiResponse::ok(StockBalance {
        item_id,
        quantity_available: stock.quantity_available,
    }))
}
