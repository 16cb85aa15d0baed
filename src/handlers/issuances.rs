use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{
        nullable, required, ApiResponse, EventIdRequest, IdRequest, ItemIdRequest, JsonBody,
    },
    models::{
        history::{self, EventHistorySummary, ItemHistorySummary, ItemIssuances},
        issuance::{self, StockChange},
        item::{self, ItemSummary},
        stock, IssuanceChanges, IssuanceRecord, MaterialIssuance, NewIssuance, Stock,
        TransactionType,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct IssuanceRequest {
    pub id: Option<i32>,
    pub item_id: Option<i32>,
    pub transaction_type: Option<String>,
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub event_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct IssuanceResponse {
    pub issuance: MaterialIssuance,
    pub stock_update: StockChange,
}

#[derive(Debug, Serialize)]
pub struct UpdatedIssuanceResponse {
    pub issuance: MaterialIssuance,
    /// One entry per item whose balance moved.
    pub stock_update: Vec<StockChange>,
}

#[derive(Debug, Serialize)]
pub struct DeletedIssuanceResponse {
    pub deleted_issuance: MaterialIssuance,
    pub stock_update: StockChange,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction: MaterialIssuance,
    pub updated_stock: Stock,
}

#[derive(Debug, Serialize)]
pub struct ItemHistory {
    pub item_info: ItemSummary,
    pub issuance_history: Vec<IssuanceRecord>,
    pub summary: ItemHistorySummary,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct EventHistory {
    pub event_id: i32,
    pub issuance_history: Vec<IssuanceRecord>,
    pub issuances_by_item: Vec<ItemIssuances>,
    pub summary: EventHistorySummary,
    pub count: usize,
}

fn positive_quantity(quantity: Decimal) -> AppResult<Decimal> {
    if quantity > Decimal::ZERO {
        stock::ensure_storable(quantity)
    } else {
        Err(AppError::Validation(
            "Quantity must be a valid positive number".to_string(),
        ))
    }
}

/// Checks a new issuance against the item's current stock row before the
/// ledger write. The write re-checks both conditions atomically.
fn precheck(stock: Option<&Stock>, new: &NewIssuance) -> AppResult<()> {
    let stock = stock.ok_or_else(|| {
        AppError::NotFound(
            "Stock record not found for this item. Please create stock first.".to_string(),
        )
    })?;
    if new.transaction_type == TransactionType::Out {
        TransactionType::Out.apply(new.item_id, stock.quantity_available, new.quantity)?;
    }
    Ok(())
}

fn parse_new_issuance(req: IssuanceRequest) -> AppResult<NewIssuance> {
    let (item_id, transaction_type, quantity) = match (req.item_id, req.transaction_type, req.quantity) {
        (Some(item_id), Some(transaction_type), Some(quantity)) => (item_id, transaction_type, quantity),
        _ => {
            return Err(AppError::Validation(
                "Item ID, transaction type, and quantity are required".to_string(),
            ))
        }
    };
    Ok(NewIssuance {
        item_id,
        transaction_type: transaction_type.parse()?,
        quantity: positive_quantity(quantity)?,
        event_id: req.event_id.flatten(),
        notes: req.notes.flatten(),
    })
}

fn parse_changes(req: IssuanceRequest) -> AppResult<(i32, IssuanceChanges)> {
    let id = required(req.id, "Issuance ID is required")?;
    let transaction_type = req
        .transaction_type
        .as_deref()
        .map(str::parse::<TransactionType>)
        .transpose()?;
    let quantity = req.quantity.map(positive_quantity).transpose()?;
    Ok((
        id,
        IssuanceChanges {
            item_id: req.item_id,
            transaction_type,
            quantity,
            event_id: req.event_id,
            notes: req.notes,
        },
    ))
}

fn single_change(entry: &issuance::LedgerEntry) -> AppResult<StockChange> {
    entry
        .stock_updates
        .first()
        .copied()
        .ok_or_else(|| AppError::Internal("ledger write produced no stock change".to_string()))
}

pub async fn create_issuance(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IssuanceRequest>,
) -> AppResult<ApiResponse<IssuanceResponse>> {
    let new = parse_new_issuance(req)?;
    let verb = match new.transaction_type {
        TransactionType::Out => "deducted",
        TransactionType::In => "added",
    };
    let current = stock::find_stock(&db, new.item_id).await?;
    precheck(current.as_ref(), &new)?;

    let entry = issuance::create_material_issuance(&db, new).await?;
    let stock_update = single_change(&entry)?;

    Ok(ApiResponse::created(IssuanceResponse {
        issuance: entry.issuance,
        stock_update,
    })
    .message(format!("Material issuance created successfully. Stock {}.", verb)))
}

pub async fn list_issuances(State(db): State<Database>) -> AppResult<ApiResponse<Vec<IssuanceRecord>>> {
    let records = issuance::list_issuances(&db).await?;
    Ok(ApiResponse::list(records))
}

pub async fn get_issuance(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<IssuanceRecord>> {
    let id = required(req.id, "Issuance ID is required")?;
    let record = issuance::get_issuance(&db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Material issuance"))?;
    Ok(ApiResponse::ok(record))
}

pub async fn item_history(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<ItemIdRequest>,
) -> AppResult<ApiResponse<ItemHistory>> {
    let item_id = required(req.item_id, "Item ID is required")?;
    let item = item::get_item_with_details(&db, item_id)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item"))?
        .item;

    let records = issuance::history_for_item(&db, item_id).await?;
    let summary = history::summarize_item(&records, item.available_quantity.unwrap_or_default());

    Ok(ApiResponse::ok(ItemHistory {
        item_info: item,
        count: records.len(),
        issuance_history: records,
        summary,
    })
    .message("Material issuance history retrieved successfully"))
}

pub async fn event_history(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<EventIdRequest>,
) -> AppResult<ApiResponse<EventHistory>> {
    let event_id = required(req.event_id, "Event ID is required")?;
    let records = issuance::history_for_event(&db, event_id).await?;

    Ok(ApiResponse::ok(EventHistory {
        event_id,
        issuances_by_item: history::group_by_item(&records),
        summary: history::summarize_event(&records),
        count: records.len(),
        issuance_history: records,
    })
    .message("Event material issuance history retrieved successfully"))
}

pub async fn update_issuance(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IssuanceRequest>,
) -> AppResult<ApiResponse<UpdatedIssuanceResponse>> {
    let (id, changes) = parse_changes(req)?;
    let entry = issuance::update_material_issuance(&db, id, changes).await?;

    Ok(ApiResponse::ok(UpdatedIssuanceResponse {
        issuance: entry.issuance,
        stock_update: entry.stock_updates,
    })
    .message("Material issuance updated successfully. Stock adjusted accordingly."))
}

pub async fn delete_issuance(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<DeletedIssuanceResponse>> {
    let id = required(req.id, "Issuance ID is required")?;
    let entry = issuance::delete_material_issuance(&db, id).await?;
    let stock_update = single_change(&entry)?;

    Ok(ApiResponse::ok(DeletedIssuanceResponse {
        deleted_issuance: entry.issuance,
        stock_update,
    })
    .message("Material issuance deleted successfully. Stock adjusted accordingly."))
}

/// Direct stock movement. Records one ledger entry, exactly like
/// `create_issuance`, and answers with the resulting stock row.
pub async fn record_transaction(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IssuanceRequest>,
) -> AppResult<ApiResponse<TransactionResponse>> {
    let new = parse_new_issuance(req)?;
    let item_id = new.item_id;

    let entry = issuance::create_material_issuance(&db, new).await?;
    let updated_stock = stock::find_stock(&db, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock not found for this item".to_string()))?;

    Ok(ApiResponse::created(TransactionResponse {
        transaction: entry.issuance,
        updated_stock,
    })
    .message("Transaction recorded successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(transaction_type: &str, quantity: i64) -> IssuanceRequest {
        IssuanceRequest {
            item_id: Some(3),
            transaction_type: Some(transaction_type.to_string()),
            quantity: Some(Decimal::from(quantity)),
            ..Default::default()
        }
    }

    #[test]
    fn new_issuances_need_item_type_and_quantity() {
        let req = IssuanceRequest {
            item_id: Some(3),
            ..Default::default()
        };
        assert!(matches!(parse_new_issuance(req), Err(AppError::Validation(_))));
    }

    #[test]
    fn unknown_transaction_types_are_rejected() {
        match parse_new_issuance(request("MOVE", 2)) {
            Err(AppError::Validation(message)) => {
                assert_eq!(message, "Transaction type must be either IN or OUT")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn quantities_must_be_positive() {
        assert!(parse_new_issuance(request("OUT", 0)).is_err());
        assert!(parse_new_issuance(request("OUT", -4)).is_err());
        let new = parse_new_issuance(request("OUT", 4)).unwrap();
        assert_eq!(new.transaction_type, TransactionType::Out);
        assert_eq!(new.quantity, Decimal::from(4));
    }

    #[test]
    fn updates_only_change_what_is_sent() {
        let req = IssuanceRequest {
            id: Some(8),
            quantity: Some(Decimal::from(50)),
            ..Default::default()
        };
        let (id, changes) = parse_changes(req).unwrap();
        assert_eq!(id, 8);
        assert_eq!(changes.quantity, Some(Decimal::from(50)));
        assert!(changes.transaction_type.is_none());
        assert!(changes.item_id.is_none());
    }

    #[test]
    fn quantities_finer_than_cents_are_rejected() {
        let mut req = request("OUT", 0);
        req.quantity = Some(Decimal::new(5, 3));
        assert!(matches!(parse_new_issuance(req), Err(AppError::Validation(_))));

        let mut req = request("IN", 0);
        req.quantity = Some(Decimal::new(125, 2));
        assert_eq!(parse_new_issuance(req).unwrap().quantity, Decimal::new(125, 2));
    }

    #[test]
    fn explicit_nulls_clear_optional_fields() {
        let req: IssuanceRequest =
            serde_json::from_str(r#"{"id": 8, "event_id": null, "notes": null}"#).unwrap();
        let (_, changes) = parse_changes(req).unwrap();
        assert_eq!(changes.event_id, Some(None));
        assert_eq!(changes.notes, Some(None));

        let req: IssuanceRequest = serde_json::from_str(r#"{"id": 8, "event_id": 3}"#).unwrap();
        let (_, changes) = parse_changes(req).unwrap();
        assert_eq!(changes.event_id, Some(Some(3)));
        assert_eq!(changes.notes, None);
    }

    fn stock_row(quantity: i64) -> Stock {
        Stock {
            id: 1,
            item_id: 3,
            quantity_available: Decimal::from(quantity),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn precheck_needs_a_stock_row() {
        let new = parse_new_issuance(request("IN", 2)).unwrap();
        assert!(matches!(precheck(None, &new), Err(AppError::NotFound(_))));
        assert!(precheck(Some(&stock_row(0)), &new).is_ok());
    }

    #[test]
    fn precheck_rejects_outs_beyond_the_balance() {
        let new = parse_new_issuance(request("OUT", 6)).unwrap();
        match precheck(Some(&stock_row(5)), &new) {
            Err(AppError::InsufficientStock {
                current, requested, ..
            }) => {
                assert_eq!(current, Decimal::from(5));
                assert_eq!(requested, Decimal::from(6));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(precheck(Some(&stock_row(6)), &new).is_ok());
    }

    #[test]
    fn updates_need_an_id() {
        assert!(parse_changes(IssuanceRequest::default()).is_err());
    }
}
