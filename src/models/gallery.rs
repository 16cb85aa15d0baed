use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{database::Database, error::AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gallery_image_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GalleryImageType {
    Design,
    Final,
}

impl GalleryImageType {
    pub fn as_str(self) -> &'static str {
        match self {
            GalleryImageType::Design => "design",
            GalleryImageType::Final => "final",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GalleryImage {
    pub id: i32,
    pub event_id: i32,
    pub image_url: String,
    pub image_type: GalleryImageType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize)]
pub struct EventImages {
    pub design: Vec<GalleryImage>,
    pub r#final: Vec<GalleryImage>,
}

pub async fn insert_image(
    db: &Database,
    event_id: i32,
    image_type: GalleryImageType,
    image_url: &str,
    notes: Option<&str>,
) -> AppResult<GalleryImage> {
    let image = sqlx::query_as::<_, GalleryImage>(
        r#"
        INSERT INTO gallery_images (event_id, image_url, image_type, notes)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(event_id)
    .bind(image_url)
    .bind(image_type)
    .bind(notes)
    .fetch_one(db)
    .await?;
    Ok(image)
}

pub async fn images_for_event(db: &Database, event_id: i32) -> AppResult<EventImages> {
    let images = sqlx::query_as::<_, GalleryImage>(
        "SELECT * FROM gallery_images WHERE event_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(event_id)
    .fetch_all(db)
    .await?;

    let (design, r#final) = images
        .into_iter()
        .partition(|image| image.image_type == GalleryImageType::Design);
    Ok(EventImages { design, r#final })
}
