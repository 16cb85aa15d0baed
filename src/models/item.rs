use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{
        category::CategoryKind,
        details::CategoryDetails,
        stock::{delete_stock, set_quantity},
    },
};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InventoryItem {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub item_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item joined with its category name and current stock.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItemSummary {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub category_name: Option<String>,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub item_image: Option<String>,
    pub available_quantity: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemWithDetails {
    #[serde(flatten)]
    pub item: ItemSummary,
    pub category_details: Option<CategoryDetails>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ItemListEntry {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub category_id: i32,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub quantity_available: Decimal,
    pub details: Option<CategoryDetails>,
}

/// Fields to change on an item; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub details: Option<CategoryDetails>,
    /// Absolute correction of the stock balance.
    pub quantity_available: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct DeletedItem {
    #[serde(flatten)]
    pub item: InventoryItem,
    pub category_name: &'static str,
    pub deleted_from: Vec<&'static str>,
}

const ITEM_SUMMARY: &str = r#"
    SELECT
        ii.id,
        ii.name,
        ii.category_id,
        c.name AS category_name,
        ii.unit,
        ii.storage_location,
        ii.notes,
        ii.item_image,
        s.quantity_available AS available_quantity,
        ii.created_at,
        ii.updated_at
    FROM inventory_items ii
    LEFT JOIN categories c ON ii.category_id = c.id
    LEFT JOIN inventory_stock s ON s.item_id = ii.id
"#;

fn details_for(kind: CategoryKind, details: Option<CategoryDetails>) -> AppResult<CategoryDetails> {
    match details {
        None => Ok(CategoryDetails::empty(kind)),
        Some(details) if details.kind() == kind => Ok(details),
        Some(_) => Err(AppError::Validation(
            "category_details do not match the item's category".to_string(),
        )),
    }
}

/// Creates the item, its category detail row and its stock row in one
/// transaction.
pub async fn create_item(db: &Database, new: NewItem) -> AppResult<InventoryItem> {
    let kind = CategoryKind::try_from(new.category_id)?;
    if new.quantity_available.is_sign_negative() {
        return Err(AppError::InvalidQuantity);
    }
    let details = details_for(kind, new.details)?;

    let mut tx = db.begin().await?;

    let item = sqlx::query_as::<_, InventoryItem>(
        r#"
        INSERT INTO inventory_items (name, category_id, unit, storage_location, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&new.name)
    .bind(new.category_id)
    .bind(&new.unit)
    .bind(&new.storage_location)
    .bind(&new.notes)
    .fetch_one(&mut *tx)
    .await?;

    details.save(&mut *tx, item.id).await?;
    set_quantity(&mut *tx, item.id, new.quantity_available).await?;

    tx.commit().await?;

    log::info!("created {} item {} ({})", kind.display_name(), item.id, item.name);
    Ok(item)
}

async fn attach_details(
    conn: &mut PgConnection,
    items: Vec<ItemSummary>,
) -> AppResult<Vec<ItemWithDetails>> {
    let mut by_kind: HashMap<CategoryKind, HashMap<i32, CategoryDetails>> = HashMap::new();
    for kind in items.iter().filter_map(|item| CategoryKind::from_id(item.category_id)) {
        if !by_kind.contains_key(&kind) {
            let rows = CategoryDetails::fetch_category(&mut *conn, kind).await?;
            by_kind.insert(kind, rows);
        }
    }

    Ok(items
        .into_iter()
        .map(|item| {
            let category_details = CategoryKind::from_id(item.category_id)
                .and_then(|kind| by_kind.get_mut(&kind))
                .and_then(|rows| rows.remove(&item.id));
            ItemWithDetails {
                item,
                category_details,
            }
        })
        .collect())
}

pub async fn list_items(db: &Database) -> AppResult<Vec<ItemWithDetails>> {
    let mut conn = db.acquire().await?;
    let sql = format!("{} ORDER BY ii.name", ITEM_SUMMARY);
    let items = sqlx::query_as::<_, ItemSummary>(&sql)
        .fetch_all(&mut *conn)
        .await?;
    attach_details(&mut *conn, items).await
}

pub async fn list_item_names(db: &Database) -> AppResult<Vec<ItemListEntry>> {
    let items = sqlx::query_as::<_, ItemListEntry>("SELECT id, name FROM inventory_items ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(items)
}

pub async fn get_item(db: &Database, id: i32) -> AppResult<Option<InventoryItem>> {
    let item = sqlx::query_as::<_, InventoryItem>("SELECT * FROM inventory_items WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(item)
}

pub async fn get_item_with_details(db: &Database, id: i32) -> AppResult<Option<ItemWithDetails>> {
    let mut conn = db.acquire().await?;
    let sql = format!("{} WHERE ii.id = $1", ITEM_SUMMARY);
    let Some(item) = sqlx::query_as::<_, ItemSummary>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let category_details = match CategoryKind::from_id(item.category_id) {
        Some(kind) => CategoryDetails::fetch(&mut *conn, kind, item.id).await?,
        None => None,
    };
    Ok(Some(ItemWithDetails {
        item,
        category_details,
    }))
}

pub async fn list_items_in_category(
    db: &Database,
    kind: CategoryKind,
) -> AppResult<Vec<ItemWithDetails>> {
    let mut conn = db.acquire().await?;
    let sql = format!("{} WHERE ii.category_id = $1 ORDER BY ii.name", ITEM_SUMMARY);
    let items = sqlx::query_as::<_, ItemSummary>(&sql)
        .bind(kind.id())
        .fetch_all(&mut *conn)
        .await?;
    attach_details(&mut *conn, items).await
}

/// Looks up an item only if it belongs to `kind`.
pub async fn get_item_in_category(
    db: &Database,
    kind: CategoryKind,
    id: i32,
) -> AppResult<Option<ItemWithDetails>> {
    Ok(get_item_with_details(db, id)
        .await?
        .filter(|found| found.item.category_id == kind.id()))
}

/// Updates an item and, in the same transaction, its detail row and stock
/// balance. Moving the item to another category replaces the detail row.
pub async fn update_item(db: &Database, id: i32, changes: ItemChanges) -> AppResult<InventoryItem> {
    let mut tx = db.begin().await?;

    let original = sqlx::query_as::<_, InventoryItem>(
        "SELECT * FROM inventory_items WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Inventory item"))?;

    let category_id = changes.category_id.unwrap_or(original.category_id);
    let kind = CategoryKind::try_from(category_id)?;

    if category_id != original.category_id {
        if let Some(previous) = CategoryKind::from_id(original.category_id) {
            CategoryDetails::delete(&mut *tx, previous, id).await?;
        }
        details_for(kind, changes.details)?.save(&mut *tx, id).await?;
    } else if let Some(details) = changes.details {
        details_for(kind, Some(details))?.save(&mut *tx, id).await?;
    }

    let item = sqlx::query_as::<_, InventoryItem>(
        r#"
        UPDATE inventory_items
        SET name = COALESCE($1, name),
            category_id = $2,
            unit = COALESCE($3, unit),
            storage_location = COALESCE($4, storage_location),
            notes = COALESCE($5, notes),
            updated_at = NOW()
        WHERE id = $6
        RETURNING *
        "#,
    )
    .bind(&changes.name)
    .bind(category_id)
    .bind(&changes.unit)
    .bind(&changes.storage_location)
    .bind(&changes.notes)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(quantity) = changes.quantity_available {
        if quantity.is_sign_negative() {
            return Err(AppError::InvalidQuantity);
        }
        set_quantity(&mut *tx, id, quantity).await?;
    }

    tx.commit().await?;

    log::info!("updated item {} ({})", item.id, item.name);
    Ok(item)
}

/// Points the item at a new image and returns the URL it replaced.
pub async fn set_item_image(db: &Database, id: i32, url: &str) -> AppResult<Option<String>> {
    let previous = sqlx::query_scalar::<_, Option<String>>(
        r#"
        UPDATE inventory_items ii
        SET item_image = $1, updated_at = NOW()
        FROM (SELECT id, item_image FROM inventory_items WHERE id = $2 FOR UPDATE) old
        WHERE ii.id = old.id
        RETURNING old.item_image
        "#,
    )
    .bind(url)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found("Inventory item"))?;
    Ok(previous)
}

/// Deletes the item with its detail row and stock row in one transaction.
/// Issuance history is kept.
pub async fn delete_inventory_item(db: &Database, id: i32) -> AppResult<DeletedItem> {
    let mut tx = db.begin().await?;

    let category_id: i32 = sqlx::query_scalar("SELECT category_id FROM inventory_items WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item"))?;
    let kind = CategoryKind::try_from(category_id)?;

    CategoryDetails::delete(&mut *tx, kind, id).await?;
    delete_stock(&mut *tx, id).await?;
    let item = sqlx::query_as::<_, InventoryItem>("DELETE FROM inventory_items WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    log::info!("deleted {} item {} ({})", kind.display_name(), item.id, item.name);
    Ok(DeletedItem {
        item,
        category_name: kind.display_name(),
        deleted_from: vec![kind.table(), "inventory_stock", "inventory_items"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::details::CarpetDetails;

    #[test]
    fn missing_details_default_to_an_empty_row() {
        let details = details_for(CategoryKind::Fabric, None).unwrap();
        assert_eq!(details, CategoryDetails::empty(CategoryKind::Fabric));
    }

    #[test]
    fn details_must_match_the_category() {
        let carpet = CategoryDetails::Carpets(CarpetDetails {
            carpet_type: Some("Persian".to_string()),
            ..Default::default()
        });
        assert!(details_for(CategoryKind::Carpets, Some(carpet.clone())).is_ok());
        assert!(matches!(
            details_for(CategoryKind::Furniture, Some(carpet)),
            Err(AppError::Validation(_))
        ));
    }

    mod database {
        use super::*;

        async fn connect() -> Database {
            let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
            let db = crate::database::create_database_pool(&url, 2).await.unwrap();
            crate::database::run_migrations(&db).await.unwrap();
            db
        }

        fn carpet(name: &str) -> NewItem {
            NewItem {
                name: name.to_string(),
                category_id: CategoryKind::Carpets.id(),
                unit: Some("pcs".to_string()),
                storage_location: None,
                notes: None,
                quantity_available: Decimal::from(12),
                details: Some(CategoryDetails::Carpets(CarpetDetails {
                    carpet_type: Some("Runner".to_string()),
                    material: Some("Wool".to_string()),
                    size: Some("3x20".to_string()),
                    ..Default::default()
                })),
            }
        }

        #[tokio::test]
        #[ignore] // requires a running Postgres at DATABASE_URL
        async fn items_are_created_and_deleted_with_their_rows() {
            let db = connect().await;
            let item = create_item(&db, carpet("Red runner")).await.unwrap();

            let found = get_item_with_details(&db, item.id).await.unwrap().unwrap();
            assert_eq!(found.item.available_quantity, Some(Decimal::from(12)));
            assert!(matches!(found.category_details, Some(CategoryDetails::Carpets(_))));

            let deleted = delete_inventory_item(&db, item.id).await.unwrap();
            assert_eq!(deleted.deleted_from, vec!["carpets", "inventory_stock", "inventory_items"]);
            assert!(get_item(&db, item.id).await.unwrap().is_none());
        }

        #[tokio::test]
        #[ignore] // requires a running Postgres at DATABASE_URL
        async fn unmapped_category_aborts_deletion_before_any_row_is_removed() {
            let db = connect().await;
            sqlx::query("INSERT INTO categories (id, name) VALUES (99, 'Lighting') ON CONFLICT DO NOTHING")
                .execute(&db)
                .await
                .unwrap();
            let id: i32 = sqlx::query_scalar(
                "INSERT INTO inventory_items (name, category_id) VALUES ('Fairy lights', 99) RETURNING id",
            )
            .fetch_one(&db)
            .await
            .unwrap();
            let mut conn = db.acquire().await.unwrap();
            set_quantity(&mut *conn, id, Decimal::from(3)).await.unwrap();
            drop(conn);

            let err = delete_inventory_item(&db, id).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCategory(99)));
            assert!(get_item(&db, id).await.unwrap().is_some());
            assert!(crate::models::stock::find_stock(&db, id).await.unwrap().is_some());
        }

        #[tokio::test]
        #[ignore] // requires a running Postgres at DATABASE_URL
        async fn changing_category_replaces_the_detail_row() {
            let db = connect().await;
            let item = create_item(&db, carpet("Blue runner")).await.unwrap();

            let changes = ItemChanges {
                category_id: Some(CategoryKind::Fabric.id()),
                ..Default::default()
            };
            update_item(&db, item.id, changes).await.unwrap();

            let found = get_item_with_details(&db, item.id).await.unwrap().unwrap();
            assert_eq!(found.item.category_id, CategoryKind::Fabric.id());
            assert!(matches!(
                found.category_details,
                Some(CategoryDetails::Fabric(ref fabric))
                    if fabric.item_id == item.id && fabric.fabric_type.is_none() && fabric.color.is_none()
            ));

            delete_inventory_item(&db, item.id).await.unwrap();
        }
    }
}
