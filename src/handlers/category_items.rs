//! Routes scoped to one category (`/furniture`, `/fabric`, ...). Every
//! category shares these handlers; the router binds the `CategoryKind`.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};

use crate::{
    database::Database,
    error::{AppError, AppResult},
    handlers::{
        items::{attach_image, image_upload, stock_quantity},
        required, ApiResponse,
    },
    models::{
        item::{self, ItemWithDetails},
        CategoryDetails, CategoryKind, ItemChanges, NewItem,
    },
    utils::{FormData, ImageStore},
};

/// `GET /{slug}`, `GET /{slug}/:id`, `POST /{slug}/create` and
/// `POST /{slug}/update` for one category.
pub fn routes<S>(kind: CategoryKind) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Database: axum::extract::FromRef<S>,
    ImageStore: axum::extract::FromRef<S>,
{
    let base = format!("/{}", kind.slug());
    Router::new()
        .route(
            &base,
            get(move |db: State<Database>| list_category_items(kind, db)),
        )
        .route(
            &format!("{}/:id", base),
            get(move |db: State<Database>, id: Path<i32>| get_category_item(kind, db, id)),
        )
        .route(
            &format!("{}/create", base),
            post(
                move |db: State<Database>, images: State<ImageStore>, form: FormData| {
                    create_category_item(kind, db, images, form)
                },
            ),
        )
        .route(
            &format!("{}/update", base),
            post(
                move |db: State<Database>, images: State<ImageStore>, form: FormData| {
                    update_category_item(kind, db, images, form)
                },
            ),
        )
}

fn item_name(kind: CategoryKind, form: &FormData) -> AppResult<String> {
    let message = format!(
        "Name is required for {} items",
        kind.item_label().to_lowercase()
    );
    form.require("name", &message)
}

/// Validated category attributes from the flat form fields.
fn category_details(kind: CategoryKind, form: &FormData) -> AppResult<CategoryDetails> {
    let details = CategoryDetails::from_form(kind, form)?;
    details.ensure_required()?;
    Ok(details)
}

async fn load(db: &Database, kind: CategoryKind, id: i32) -> AppResult<ItemWithDetails> {
    item::get_item_in_category(db, kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} item not found", kind.item_label())))
}

pub async fn list_category_items(
    kind: CategoryKind,
    State(db): State<Database>,
) -> AppResult<ApiResponse<Vec<ItemWithDetails>>> {
    let items = item::list_items_in_category(&db, kind).await?;
    Ok(ApiResponse::list(items))
}

pub async fn get_category_item(
    kind: CategoryKind,
    State(db): State<Database>,
    Path(id): Path<i32>,
) -> AppResult<ApiResponse<ItemWithDetails>> {
    let item = load(&db, kind, id).await?;
    Ok(ApiResponse::ok(item))
}

pub async fn create_category_item(
    kind: CategoryKind,
    State(db): State<Database>,
    State(images): State<ImageStore>,
    mut form: FormData,
) -> AppResult<ApiResponse<ItemWithDetails>> {
    let details = category_details(kind, &form)?;
    let name = item_name(kind, &form)?;
    let image = image_upload(&mut form)?;

    let new = NewItem {
        name,
        category_id: kind.id(),
        unit: form.text("unit"),
        storage_location: form.text("storage_location"),
        notes: form.text("notes"),
        quantity_available: stock_quantity(&form)?.unwrap_or_default(),
        details: Some(details),
    };
    let item = item::create_item(&db, new).await?;
    let item = attach_image(&db, &images, item, image).await;

    let created = load(&db, kind, item.id).await?;
    Ok(ApiResponse::created(created).message(format!("{} item created successfully", kind.item_label())))
}

pub async fn update_category_item(
    kind: CategoryKind,
    State(db): State<Database>,
    State(images): State<ImageStore>,
    mut form: FormData,
) -> AppResult<ApiResponse<ItemWithDetails>> {
    let id = required(form.parse::<i32>("id")?, "Item ID is required")?;
    let details = category_details(kind, &form)?;
    let name = item_name(kind, &form)?;
    let image = image_upload(&mut form)?;

    // the item must already belong to this category
    load(&db, kind, id).await?;

    let changes = ItemChanges {
        name: Some(name),
        category_id: None,
        unit: form.text("unit"),
        storage_location: form.text("storage_location"),
        notes: form.text("notes"),
        details: Some(details),
        quantity_available: stock_quantity(&form)?,
    };
    let item = item::update_item(&db, id, changes).await?;
    attach_image(&db, &images, item, image).await;

    let updated = load(&db, kind, id).await?;
    Ok(ApiResponse::ok(updated).message(format!("{} item updated successfully", kind.item_label())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_category_fields_use_the_category_message() {
        let form = FormData::from_fields([("name", "Teak chair"), ("material", "Teak")]);
        match category_details(CategoryKind::Furniture, &form) {
            Err(AppError::Validation(message)) => assert_eq!(
                message,
                "Name, material, and dimensions are required for furniture items"
            ),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn missing_names_mention_the_category() {
        let form = FormData::from_fields([("fabric_type", "Silk")]);
        assert!(category_details(CategoryKind::Fabric, &form).is_ok());
        match item_name(CategoryKind::FrameStructures, &form) {
            Err(AppError::Validation(message)) => {
                assert_eq!(message, "Name is required for frame structure items")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
