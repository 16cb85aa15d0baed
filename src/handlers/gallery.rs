use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::Serialize;

use crate::{
    database::Database,
    error::AppResult,
    handlers::{required, ApiResponse, EventIdRequest, JsonBody},
    models::gallery::{self, GalleryImage, GalleryImageType},
    utils::{FormData, ImageStore},
};

#[derive(Debug, Serialize)]
pub struct EventGallery {
    pub event_id: i32,
    pub design_images: Vec<GalleryImage>,
    pub final_images: Vec<GalleryImage>,
    pub design_count: usize,
    pub final_count: usize,
    pub total_images: usize,
}

async fn upload(
    db: &Database,
    images: &ImageStore,
    image_type: GalleryImageType,
    mut form: FormData,
) -> AppResult<GalleryImage> {
    let event_id = required(form.parse::<i32>("event_id")?, "Event ID is required")?;
    let file = required(form.take_file("image"), "Image file is required")?;
    ImageStore::validate(&file)?;
    let notes = match image_type {
        GalleryImageType::Design => form.text("notes"),
        GalleryImageType::Final => form.text("description").or_else(|| form.text("notes")),
    };

    let url = images
        .store_event_image(event_id, image_type.as_str(), &file)
        .await?;
    match gallery::insert_image(db, event_id, image_type, &url, notes.as_deref()).await {
        Ok(image) => Ok(image),
        Err(err) => {
            images.discard(&url).await;
            Err(err)
        }
    }
}

pub async fn upload_design(
    State(db): State<Database>,
    State(images): State<ImageStore>,
    form: FormData,
) -> AppResult<ApiResponse<GalleryImage>> {
    let image = upload(&db, &images, GalleryImageType::Design, form).await?;
    Ok(ApiResponse::created(image).message("Design image uploaded successfully"))
}

pub async fn upload_final(
    State(db): State<Database>,
    State(images): State<ImageStore>,
    form: FormData,
) -> AppResult<ApiResponse<GalleryImage>> {
    let image = upload(&db, &images, GalleryImageType::Final, form).await?;
    Ok(ApiResponse::created(image).message("Final image uploaded successfully"))
}

pub async fn event_images(
    State(db): State<Database>,
    WithRejection(Json(req), _): JsonBody<EventIdRequest>,
) -> AppResult<ApiResponse<EventGallery>> {
    let event_id = required(req.event_id, "Event ID is required in request body")?;
    let images = gallery::images_for_event(&db, event_id).await?;

    let design_count = images.design.len();
    let final_count = images.r#final.len();
    Ok(ApiResponse::ok(EventGallery {
        event_id,
        design_images: images.design,
        final_images: images.r#final,
        design_count,
        final_count,
        total_images: design_count + final_count,
    })
    .message("Event images retrieved successfully"))
}
