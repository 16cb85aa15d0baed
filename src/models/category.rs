use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    database::Database,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The fixed set of stock categories. Each one owns a detail table keyed by
/// `item_id`; the discriminant is the row id seeded into `categories`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryKind {
    Stationery = 1,
    Furniture = 2,
    Fabric = 3,
    FrameStructures = 4,
    Carpets = 5,
    ThermocolMaterials = 6,
    MurtiSets = 7,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 7] = [
        CategoryKind::Stationery,
        CategoryKind::Furniture,
        CategoryKind::Fabric,
        CategoryKind::FrameStructures,
        CategoryKind::Carpets,
        CategoryKind::ThermocolMaterials,
        CategoryKind::MurtiSets,
    ];

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn id(self) -> i32 {
        self as i32
    }

    /// Detail table holding this category's attributes.
    pub fn table(self) -> &'static str {
        match self {
            CategoryKind::Stationery => "stationery",
            CategoryKind::Furniture => "furniture",
            CategoryKind::Fabric => "fabric",
            CategoryKind::FrameStructures => "frame_structures",
            CategoryKind::Carpets => "carpets",
            CategoryKind::ThermocolMaterials => "thermocol_materials",
            CategoryKind::MurtiSets => "murti_sets",
        }
    }

    /// URL segment used by the per-category routes.
    pub fn slug(self) -> &'static str {
        match self {
            CategoryKind::Stationery => "stationery",
            CategoryKind::Furniture => "furniture",
            CategoryKind::Fabric => "fabric",
            CategoryKind::FrameStructures => "frame-structures",
            CategoryKind::Carpets => "carpets",
            CategoryKind::ThermocolMaterials => "thermocol-materials",
            CategoryKind::MurtiSets => "murti-sets",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            CategoryKind::Stationery => "Stationery",
            CategoryKind::Furniture => "Furniture",
            CategoryKind::Fabric => "Fabric",
            CategoryKind::FrameStructures => "Frame Structures",
            CategoryKind::Carpets => "Carpets",
            CategoryKind::ThermocolMaterials => "Thermocol Materials",
            CategoryKind::MurtiSets => "Murti Sets",
        }
    }

    /// Singular noun used in response messages ("Carpet item created").
    pub fn item_label(self) -> &'static str {
        match self {
            CategoryKind::Stationery => "Stationery",
            CategoryKind::Furniture => "Furniture",
            CategoryKind::Fabric => "Fabric",
            CategoryKind::FrameStructures => "Frame structure",
            CategoryKind::Carpets => "Carpet",
            CategoryKind::ThermocolMaterials => "Thermocol material",
            CategoryKind::MurtiSets => "Murti set",
        }
    }
}

impl TryFrom<i32> for CategoryKind {
    type Error = AppError;

    fn try_from(id: i32) -> Result<Self, Self::Error> {
        CategoryKind::from_id(id).ok_or(AppError::InvalidCategory(id))
    }
}

pub async fn create_category(db: &Database, name: &str) -> AppResult<Category> {
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES ($1) RETURNING *",
    )
    .bind(name)
    .fetch_one(db)
    .await?;
    Ok(category)
}

pub async fn list_categories(db: &Database) -> AppResult<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(categories)
}

pub async fn get_category(db: &Database, id: i32) -> AppResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(category)
}

pub async fn update_category(db: &Database, id: i32, name: &str) -> AppResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $1 WHERE id = $2 RETURNING *",
    )
    .bind(name)
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(category)
}

pub async fn delete_category(db: &Database, id: i32) -> AppResult<Option<Category>> {
    let category = sqlx::query_as::<_, Category>("DELETE FROM categories WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(category)
}
