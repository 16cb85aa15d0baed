use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use rust_decimal::Decimal;

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{required, ApiResponse, IdRequest, JsonBody},
    models::{
        item::{self, DeletedItem, ItemListEntry, ItemWithDetails},
        stock, CategoryDetails, CategoryKind, InventoryItem, ItemChanges, NewItem,
    },
    utils::{FormData, ImageStore, UploadedFile},
};

/// Reads an optional image part and rejects unsupported file types before
/// anything is written.
pub(crate) fn image_upload(form: &mut FormData) -> AppResult<Option<UploadedFile>> {
    let file = form.take_file("item_image");
    if let Some(file) = &file {
        ImageStore::validate(file)?;
    }
    Ok(file)
}

pub(crate) fn stock_quantity(form: &FormData) -> AppResult<Option<Decimal>> {
    match form.decimal("quantity_available")? {
        Some(quantity) if quantity.is_sign_negative() => Err(AppError::Validation(
            "Quantity must be a non-negative number".to_string(),
        )),
        Some(quantity) => stock::ensure_storable(quantity).map(Some),
        None => Ok(None),
    }
}

/// Stores `file` as the item's image once the item rows are committed. A
/// storage failure leaves the item without the new image.
pub(crate) async fn attach_image(
    db: &Database,
    images: &ImageStore,
    mut item: InventoryItem,
    file: Option<UploadedFile>,
) -> InventoryItem {
    let Some(file) = file else {
        return item;
    };

    let url = match images.store_item_image(item.id, &file).await {
        Ok(url) => url,
        Err(err) => {
            log::warn!("could not store image for item {}: {}", item.id, err);
            return item;
        }
    };

    match item::set_item_image(db, item.id, &url).await {
        Ok(previous) => {
            if let Some(previous) = previous.filter(|previous| *previous != url) {
                images.discard(&previous).await;
            }
            item.item_image = Some(url);
        }
        Err(err) => {
            log::warn!("could not record image for item {}: {}", item.id, err);
            images.discard(&url).await;
        }
    }
    item
}

pub async fn create_item(
    State(db): State<Database>,
    State(images): State<ImageStore>,
    mut form: FormData,
) -> AppResult<ApiResponse<InventoryItem>> {
    let (name, category_id) = match (form.text("name"), form.parse::<i32>("category_id")?) {
        (Some(name), Some(category_id)) => (name, category_id),
        _ => {
            return Err(AppError::Validation(
                "Name and category_id are required".to_string(),
            ))
        }
    };
    let kind = CategoryKind::try_from(category_id)?;
    let details = form
        .text("category_details")
        .map(|raw| CategoryDetails::from_json(kind, &raw))
        .transpose()?;
    let image = image_upload(&mut form)?;

    let new = NewItem {
        name,
        category_id,
        unit: form.text("unit"),
        storage_location: form.text("storage_location"),
        notes: form.text("notes"),
        quantity_available: stock_quantity(&form)?.unwrap_or(Decimal::ZERO),
        details,
    };
    let item = item::create_item(&db, new).await?;
    let item = attach_image(&db, &images, item, image).await;

    Ok(ApiResponse::created(item).message("Inventory item created successfully"))
}

pub async fn list_items(State(db): State<Database>) -> AppResult<ApiResponse<Vec<ItemWithDetails>>> {
    let items = item::list_items(&db).await?;
    Ok(ApiResponse::list(items))
}

pub async fn list_item_names(State(db): State<Database>) -> AppResult<ApiResponse<Vec<ItemListEntry>>> {
    let items = item::list_item_names(&db).await?;
    Ok(ApiResponse::list(items))
}

pub async fn get_item(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<ItemWithDetails>> {
    let id = required(req.id, "Item ID is required")?;
    let item = item::get_item_with_details(&db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory item"))?;
    Ok(ApiResponse::ok(item))
}

pub async fn update_item(
    State(db): State<Database>,
    State(images): State<ImageStore>,
    mut form: FormData,
) -> AppResult<ApiResponse<InventoryItem>> {
    let id = required(form.parse::<i32>("id")?, "Item ID is required")?;
    let category_id = form.parse::<i32>("category_id")?;

    let details = match form.text("category_details") {
        Some(raw) => {
            let category_id = match category_id {
                Some(category_id) => category_id,
                None => {
                    item::get_item(&db, id)
                        .await?
                        .ok_or_else(|| AppError::not_found("Inventory item"))?
                        .category_id
                }
            };
            Some(CategoryDetails::from_json(CategoryKind::try_from(category_id)?, &raw)?)
        }
        None => None,
    };
    let image = image_upload(&mut form)?;

    let changes = ItemChanges {
        name: form.text("name"),
        category_id,
        unit: form.text("unit"),
        storage_location: form.text("storage_location"),
        notes: form.text("notes"),
        details,
        quantity_available: stock_quantity(&form)?,
    };
    let item = item::update_item(&db, id, changes).await?;
    let item = attach_image(&db, &images, item, image).await;

    Ok(ApiResponse::ok(item).message("Inventory item updated successfully"))
}

pub async fn delete_item(
    State(db): State<Database>,
    State(images): State<ImageStore>,
    WithRejection(Json(req), _): JsonBody<IdRequest>,
) -> AppResult<ApiResponse<DeletedItem>> {
    let id = required(req.id, "Item ID is required")?;
    let deleted = item::delete_inventory_item(&db, id).await?;

    if let Some(url) = &deleted.item.item_image {
        images.discard(url).await;
    }

    Ok(ApiResponse::ok(deleted).message("Inventory item deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_quantity_is_optional_but_must_be_storable() {
        assert_eq!(stock_quantity(&FormData::default()).unwrap(), None);

        let form = FormData::from_fields([("quantity_available", "12.50")]);
        assert_eq!(stock_quantity(&form).unwrap(), Some(Decimal::new(1250, 2)));

        let form = FormData::from_fields([("quantity_available", "12.505")]);
        assert!(matches!(stock_quantity(&form), Err(AppError::Validation(_))));

        let form = FormData::from_fields([("quantity_available", "-1")]);
        assert!(stock_quantity(&form).is_err());
    }
}
