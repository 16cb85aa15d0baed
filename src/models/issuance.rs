use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::stock::{apply_transaction_to_stock, ensure_storable},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Items returning to the warehouse.
    In,
    /// Items leaving the warehouse, usually issued to an event.
    Out,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            TransactionType::In => TransactionType::Out,
            TransactionType::Out => TransactionType::In,
        }
    }

    /// Stock delta of moving `quantity` in this direction.
    pub fn signed(self, quantity: Decimal) -> Decimal {
        match self {
            TransactionType::In => quantity,
            TransactionType::Out => -quantity,
        }
    }

    /// Balance after moving `quantity` from `current`, with the same rules the
    /// database enforces in `apply_transaction_to_stock`.
    pub fn apply(self, item_id: i32, current: Decimal, quantity: Decimal) -> AppResult<Decimal> {
        let next = match self {
            TransactionType::In => current.checked_add(quantity),
            TransactionType::Out => current.checked_sub(quantity),
        }
        .ok_or(AppError::InvalidQuantity)?;

        if next.is_sign_negative() && !next.is_zero() {
            return Err(AppError::InsufficientStock {
                item_id,
                current,
                requested: quantity,
            });
        }
        Ok(next)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(TransactionType::In),
            "OUT" => Ok(TransactionType::Out),
            _ => Err(AppError::Validation(
                "Transaction type must be either IN or OUT".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaterialIssuance {
    pub id: i32,
    pub item_id: i32,
    pub transaction_type: TransactionType,
    pub quantity_issued: Decimal,
    pub event_id: Option<i32>,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// An issuance joined with the item it moved, for listings and history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IssuanceRecord {
    pub id: i32,
    pub item_id: i32,
    pub transaction_type: TransactionType,
    pub quantity_issued: Decimal,
    pub event_id: Option<i32>,
    pub notes: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub item_name: Option<String>,
    pub category_name: Option<String>,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub item_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIssuance {
    pub item_id: i32,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub event_id: Option<i32>,
    pub notes: Option<String>,
}

/// Fields to change on an issuance; `None` keeps the stored value. The
/// optional columns take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct IssuanceChanges {
    pub item_id: Option<i32>,
    pub transaction_type: Option<TransactionType>,
    pub quantity: Option<Decimal>,
    pub event_id: Option<Option<i32>>,
    pub notes: Option<Option<String>>,
}

/// Effect of one stock adjustment on an item's balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StockChange {
    pub item_id: i32,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    pub change: Decimal,
}

impl StockChange {
    fn after(adjustment: StockAdjustment, new_quantity: Decimal) -> Self {
        let change = adjustment.transaction_type.signed(adjustment.quantity);
        Self {
            item_id: adjustment.item_id,
            previous_quantity: new_quantity - change,
            new_quantity,
            change,
        }
    }
}

/// A ledger write together with the stock changes it produced.
#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    pub issuance: MaterialIssuance,
    pub stock_updates: Vec<StockChange>,
}

impl LedgerEntry {
    pub fn balance_of(&self, item_id: i32) -> Option<Decimal> {
        self.stock_updates
            .iter()
            .rev()
            .find(|update| update.item_id == item_id)
            .map(|update| update.new_quantity)
    }
}

/// One call to the stock primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub item_id: i32,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
}

impl StockAdjustment {
    /// The movement that cancels `issuance`'s effect on stock.
    pub fn reversing(issuance: &MaterialIssuance) -> Self {
        Self {
            item_id: issuance.item_id,
            transaction_type: issuance.transaction_type.inverse(),
            quantity: issuance.quantity_issued,
        }
    }
}

/// Stock movements that turn `original` into an issuance of `quantity` units
/// of `item_id` in direction `transaction_type`: the original is reversed,
/// then the new movement is applied. Each step must leave its item
/// non-negative, even when both touch the same item.
pub fn update_plan(
    original: &MaterialIssuance,
    item_id: i32,
    transaction_type: TransactionType,
    quantity: Decimal,
) -> [StockAdjustment; 2] {
    [
        StockAdjustment::reversing(original),
        StockAdjustment {
            item_id,
            transaction_type,
            quantity,
        },
    ]
}

const ISSUANCE_WITH_ITEM: &str = r#"
    SELECT
        mi.id,
        mi.item_id,
        mi.transaction_type,
        mi.quantity_issued,
        mi.event_id,
        mi.notes,
        mi.issued_at,
        ii.name AS item_name,
        c.name AS category_name,
        ii.unit,
        ii.storage_location,
        ii.item_image
    FROM material_issuances mi
    LEFT JOIN inventory_items ii ON mi.item_id = ii.id
    LEFT JOIN categories c ON ii.category_id = c.id
"#;

pub async fn create_material_issuance(db: &Database, new: NewIssuance) -> AppResult<LedgerEntry> {
    if new.quantity <= Decimal::ZERO {
        return Err(AppError::InvalidQuantity);
    }
    ensure_storable(new.quantity)?;

    let mut tx = db.begin().await?;

    let issuance = sqlx::query_as::<_, MaterialIssuance>(
        r#"
        INSERT INTO material_issuances (item_id, transaction_type, quantity_issued, event_id, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(new.item_id)
    .bind(new.transaction_type)
    .bind(new.quantity)
    .bind(new.event_id)
    .bind(&new.notes)
    .fetch_one(&mut *tx)
    .await?;

    let adjustment = StockAdjustment {
        item_id: new.item_id,
        transaction_type: new.transaction_type,
        quantity: new.quantity,
    };
    let new_quantity = apply_transaction_to_stock(
        &mut *tx,
        adjustment.item_id,
        adjustment.transaction_type,
        adjustment.quantity,
    )
    .await?;

    tx.commit().await?;

    log::info!(
        "issuance {} recorded: {} {} of item {}",
        issuance.id,
        issuance.transaction_type,
        issuance.quantity_issued,
        issuance.item_id
    );

    Ok(LedgerEntry {
        issuance,
        stock_updates: vec![StockChange::after(adjustment, new_quantity)],
    })
}

pub async fn update_material_issuance(
    db: &Database,
    id: i32,
    changes: IssuanceChanges,
) -> AppResult<LedgerEntry> {
    let mut tx = db.begin().await?;

    let original = sqlx::query_as::<_, MaterialIssuance>(
        "SELECT * FROM material_issuances WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Material issuance"))?;

    let item_id = changes.item_id.unwrap_or(original.item_id);
    let transaction_type = changes.transaction_type.unwrap_or(original.transaction_type);
    let quantity = changes.quantity.unwrap_or(original.quantity_issued);
    if quantity <= Decimal::ZERO {
        return Err(AppError::InvalidQuantity);
    }
    ensure_storable(quantity)?;

    let mut stock_updates = Vec::new();
    for adjustment in update_plan(&original, item_id, transaction_type, quantity) {
        let new_quantity = apply_transaction_to_stock(
            &mut *tx,
            adjustment.item_id,
            adjustment.transaction_type,
            adjustment.quantity,
        )
        .await?;
        stock_updates.push(StockChange::after(adjustment, new_quantity));
    }

    let issuance = sqlx::query_as::<_, MaterialIssuance>(
        r#"
        UPDATE material_issuances
        SET item_id = $1, transaction_type = $2, quantity_issued = $3, event_id = $4, notes = $5
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(transaction_type)
    .bind(quantity)
    .bind(changes.event_id.unwrap_or(original.event_id))
    .bind(changes.notes.unwrap_or(original.notes))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    log::info!(
        "issuance {} updated: {} {} of item {}",
        issuance.id,
        issuance.transaction_type,
        issuance.quantity_issued,
        issuance.item_id
    );

    Ok(LedgerEntry {
        issuance,
        stock_updates,
    })
}

pub async fn delete_material_issuance(db: &Database, id: i32) -> AppResult<LedgerEntry> {
    let mut tx = db.begin().await?;

    let issuance = sqlx::query_as::<_, MaterialIssuance>(
        "SELECT * FROM material_issuances WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Material issuance"))?;

    let reversal = StockAdjustment::reversing(&issuance);
    let new_quantity = apply_transaction_to_stock(
        &mut *tx,
        reversal.item_id,
        reversal.transaction_type,
        reversal.quantity,
    )
    .await?;

    sqlx::query("DELETE FROM material_issuances WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("issuance {} deleted, item {} restored", issuance.id, issuance.item_id);

    Ok(LedgerEntry {
        issuance,
        stock_updates: vec![StockChange::after(reversal, new_quantity)],
    })
}

pub async fn list_issuances(db: &Database) -> AppResult<Vec<IssuanceRecord>> {
    let sql = format!("{} ORDER BY mi.issued_at DESC, mi.id DESC", ISSUANCE_WITH_ITEM);
    let records = sqlx::query_as::<_, IssuanceRecord>(&sql).fetch_all(db).await?;
    Ok(records)
}

pub async fn get_issuance(db: &Database, id: i32) -> AppResult<Option<IssuanceRecord>> {
    let sql = format!("{} WHERE mi.id = $1", ISSUANCE_WITH_ITEM);
    let record = sqlx::query_as::<_, IssuanceRecord>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(record)
}

pub async fn history_for_item(db: &Database, item_id: i32) -> AppResult<Vec<IssuanceRecord>> {
    let sql = format!(
        "{} WHERE mi.item_id = $1 ORDER BY mi.issued_at DESC, mi.id DESC",
        ISSUANCE_WITH_ITEM
    );
    let records = sqlx::query_as::<_, IssuanceRecord>(&sql)
        .bind(item_id)
        .fetch_all(db)
        .await?;
    Ok(records)
}

pub async fn history_for_event(db: &Database, event_id: i32) -> AppResult<Vec<IssuanceRecord>> {
    let sql = format!(
        "{} WHERE mi.event_id = $1 ORDER BY mi.issued_at DESC, mi.id DESC",
        ISSUANCE_WITH_ITEM
    );
    let records = sqlx::query_as::<_, IssuanceRecord>(&sql)
        .bind(event_id)
        .fetch_all(db)
        .await?;
    Ok(records)
}
