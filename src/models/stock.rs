use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::TransactionType,
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Stock {
    pub id: i32,
    pub item_id: i32,
    pub quantity_available: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StockOverview {
    pub id: i32,
    pub item_id: i32,
    pub quantity_available: Decimal,
    pub updated_at: DateTime<Utc>,
    pub item_name: Option<String>,
    pub category_name: Option<String>,
}

/// Decimal places kept by the `NUMERIC(14, 2)` quantity columns.
pub const QUANTITY_SCALE: u32 = 2;

/// Rejects quantities the database would round. Stock and issuance rows
/// must store exactly the quantity that moved.
pub fn ensure_storable(quantity: Decimal) -> AppResult<Decimal> {
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err(AppError::Validation(format!(
            "Quantity cannot have more than {} decimal places",
            QUANTITY_SCALE
        )));
    }
    Ok(quantity)
}

pub async fn create_stock(db: &Database, item_id: i32, quantity: Decimal) -> AppResult<Stock> {
    let stock = sqlx::query_as::<_, Stock>(
        "INSERT INTO inventory_stock (item_id, quantity_available) VALUES ($1, $2) RETURNING *",
    )
    .bind(item_id)
    .bind(quantity)
    .fetch_one(db)
    .await?;
    Ok(stock)
}

pub async fn get_stock(conn: &mut PgConnection, item_id: i32) -> AppResult<Option<Stock>> {
    let stock = sqlx::query_as::<_, Stock>("SELECT * FROM inventory_stock WHERE item_id = $1")
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(stock)
}

pub async fn find_stock(db: &Database, item_id: i32) -> AppResult<Option<Stock>> {
    let mut conn = db.acquire().await?;
    get_stock(&mut conn, item_id).await
}

/// Overwrites the balance of an existing stock row. This is a manual
/// correction and bypasses the issuance ledger.
pub async fn update_stock(db: &Database, item_id: i32, quantity: Decimal) -> AppResult<Option<Stock>> {
    let stock = sqlx::query_as::<_, Stock>(
        "UPDATE inventory_stock SET quantity_available = $1, updated_at = NOW() WHERE item_id = $2 RETURNING *",
    )
    .bind(quantity)
    .bind(item_id)
    .fetch_optional(db)
    .await?;
    Ok(stock)
}

/// Sets the balance of an item, creating its stock row when missing.
pub async fn set_quantity(conn: &mut PgConnection, item_id: i32, quantity: Decimal) -> AppResult<Stock> {
    let stock = sqlx::query_as::<_, Stock>(
        r#"
        INSERT INTO inventory_stock (item_id, quantity_available)
        VALUES ($1, $2)
        ON CONFLICT (item_id)
        DO UPDATE SET quantity_available = EXCLUDED.quantity_available, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await?;
    Ok(stock)
}

pub async fn list_stock(db: &Database) -> AppResult<Vec<StockOverview>> {
    let stock = sqlx::query_as::<_, StockOverview>(
        r#"
        SELECT
            s.id,
            s.item_id,
            s.quantity_available,
            s.updated_at,
            ii.name AS item_name,
            c.name AS category_name
        FROM inventory_stock s
        LEFT JOIN inventory_items ii ON s.item_id = ii.id
        LEFT JOIN categories c ON ii.category_id = c.id
        ORDER BY ii.name
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(stock)
}

pub async fn delete_stock(conn: &mut PgConnection, item_id: i32) -> AppResult<u64> {
    let result = sqlx::query("DELETE FROM inventory_stock WHERE item_id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Moves `quantity` units of `item_id` in or out of stock and returns the new
/// balance. Every ledger write goes through here.
///
/// The check and the write are one conditional `UPDATE`, so concurrent OUT
/// movements cannot both pass the non-negativity check against a stale
/// balance. Runs on the caller's transaction and never commits.
pub async fn apply_transaction_to_stock(
    conn: &mut PgConnection,
    item_id: i32,
    transaction_type: TransactionType,
    quantity: Decimal,
) -> AppResult<Decimal> {
    if quantity.is_sign_negative() {
        return Err(AppError::InvalidQuantity);
    }
    ensure_storable(quantity)?;

    let sql = match transaction_type {
        TransactionType::Out => {
            r#"
            UPDATE inventory_stock
            SET quantity_available = quantity_available - $2, updated_at = NOW()
            WHERE item_id = $1 AND quantity_available >= $2
            RETURNING quantity_available
            "#
        }
        TransactionType::In => {
            r#"
            UPDATE inventory_stock
            SET quantity_available = quantity_available + $2, updated_at = NOW()
            WHERE item_id = $1
            RETURNING quantity_available
            "#
        }
    };

    let updated = sqlx::query_scalar::<_, Decimal>(sql)
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(new_quantity) = updated {
        log::debug!(
            "stock {} {} {} -> {}",
            item_id,
            transaction_type,
            quantity,
            new_quantity
        );
        return Ok(new_quantity);
    }

    // No row matched: either the stock row is missing or the OUT would go negative.
    match get_stock(conn, item_id).await? {
        None => Err(AppError::NotFound(
            "Stock record not found for this item. Please create stock first.".to_string(),
        )),
        Some(stock) => match transaction_type.apply(item_id, stock.quantity_available, quantity) {
            Err(err) => Err(err),
            // the balance moved between the update and this read
            Ok(_) => Err(AppError::Conflict(
                "Stock changed concurrently, please retry".to_string(),
            )),
        },
    }
}
