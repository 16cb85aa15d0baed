use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{
    postgres::PgRow,
    query_builder::Separated,
    FromRow, PgConnection, Postgres, QueryBuilder,
};

use crate::{
    error::{AppError, AppResult},
    models::CategoryKind,
    utils::FormData,
};

/// One category's attribute row. Column lists drive the generic queries
/// below, so the order of `COLUMNS` must match `push_values`.
trait DetailRow:
    for<'r> FromRow<'r, PgRow> + Serialize + DeserializeOwned + Default + Send + Unpin
{
    const KIND: CategoryKind;
    const COLUMNS: &'static [&'static str];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>);

    fn from_form(form: &FormData) -> AppResult<Self>;

    /// Error message when a field the category requires is blank.
    fn missing_required(&self) -> Option<&'static str>;
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StationeryDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub specifications: Option<String>,
}

impl DetailRow for StationeryDetails {
    const KIND: CategoryKind = CategoryKind::Stationery;
    const COLUMNS: &'static [&'static str] = &["specifications"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.specifications.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            specifications: form.text("specifications"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        blank(&self.specifications)
            .then_some("Name and specifications are required for stationery items")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FurnitureDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub material: Option<String>,
    pub dimensions: Option<String>,
}

impl DetailRow for FurnitureDetails {
    const KIND: CategoryKind = CategoryKind::Furniture;
    const COLUMNS: &'static [&'static str] = &["material", "dimensions"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.material.clone());
        values.push_bind(self.dimensions.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            material: form.text("material"),
            dimensions: form.text("dimensions"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        (blank(&self.material) || blank(&self.dimensions))
            .then_some("Name, material, and dimensions are required for furniture items")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FabricDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub fabric_type: Option<String>,
    pub pattern: Option<String>,
    pub width: Option<Decimal>,
    pub length: Option<Decimal>,
    pub color: Option<String>,
}

impl DetailRow for FabricDetails {
    const KIND: CategoryKind = CategoryKind::Fabric;
    const COLUMNS: &'static [&'static str] = &["fabric_type", "pattern", "width", "length", "color"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.fabric_type.clone());
        values.push_bind(self.pattern.clone());
        values.push_bind(self.width);
        values.push_bind(self.length);
        values.push_bind(self.color.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            fabric_type: form.text("fabric_type"),
            pattern: form.text("pattern"),
            width: form.decimal("width")?,
            length: form.decimal("length")?,
            color: form.text("color"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        blank(&self.fabric_type).then_some("Name and fabric_type are required for fabric items")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FrameStructureDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub frame_type: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
}

impl DetailRow for FrameStructureDetails {
    const KIND: CategoryKind = CategoryKind::FrameStructures;
    const COLUMNS: &'static [&'static str] = &["frame_type", "material", "dimensions"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.frame_type.clone());
        values.push_bind(self.material.clone());
        values.push_bind(self.dimensions.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            frame_type: form.text("frame_type"),
            material: form.text("material"),
            dimensions: form.text("dimensions"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        (blank(&self.frame_type) || blank(&self.material) || blank(&self.dimensions)).then_some(
            "Name, frame_type, material, and dimensions are required for frame structure items",
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CarpetDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub carpet_type: Option<String>,
    pub material: Option<String>,
    pub size: Option<String>,
}

impl DetailRow for CarpetDetails {
    const KIND: CategoryKind = CategoryKind::Carpets;
    const COLUMNS: &'static [&'static str] = &["carpet_type", "material", "size"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.carpet_type.clone());
        values.push_bind(self.material.clone());
        values.push_bind(self.size.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            carpet_type: form.text("carpet_type"),
            material: form.text("material"),
            size: form.text("size"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        (blank(&self.carpet_type) || blank(&self.material) || blank(&self.size))
            .then_some("Name, carpet_type, material, and size are required for carpet items")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ThermocolDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub thermocol_type: Option<String>,
    pub density: Option<Decimal>,
    pub dimensions: Option<String>,
}

impl DetailRow for ThermocolDetails {
    const KIND: CategoryKind = CategoryKind::ThermocolMaterials;
    const COLUMNS: &'static [&'static str] = &["thermocol_type", "density", "dimensions"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.thermocol_type.clone());
        values.push_bind(self.density);
        values.push_bind(self.dimensions.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            thermocol_type: form.text("thermocol_type"),
            density: form.decimal("density")?,
            dimensions: form.text("dimensions"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        (blank(&self.thermocol_type) || blank(&self.dimensions)).then_some(
            "Name, thermocol_type, and dimensions are required for thermocol material items",
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MurtiSetDetails {
    #[serde(skip)]
    pub item_id: i32,
    pub set_number: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
}

impl DetailRow for MurtiSetDetails {
    const KIND: CategoryKind = CategoryKind::MurtiSets;
    const COLUMNS: &'static [&'static str] = &["set_number", "material", "dimensions"];

    fn push_values(&self, values: &mut Separated<'_, '_, Postgres, &'static str>) {
        values.push_bind(self.set_number.clone());
        values.push_bind(self.material.clone());
        values.push_bind(self.dimensions.clone());
    }

    fn from_form(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            set_number: form.text("set_number"),
            material: form.text("material"),
            dimensions: form.text("dimensions"),
            ..Self::default()
        })
    }

    fn missing_required(&self) -> Option<&'static str> {
        (blank(&self.set_number) || blank(&self.material) || blank(&self.dimensions)).then_some(
            "Name, set_number, material, and dimensions are required for murti set items",
        )
    }
}

/// Category-specific attributes of an inventory item, one case per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryDetails {
    Stationery(StationeryDetails),
    Furniture(FurnitureDetails),
    Fabric(FabricDetails),
    FrameStructures(FrameStructureDetails),
    Carpets(CarpetDetails),
    ThermocolMaterials(ThermocolDetails),
    MurtiSets(MurtiSetDetails),
}

impl CategoryDetails {
    pub fn kind(&self) -> CategoryKind {
        match self {
            CategoryDetails::Stationery(_) => CategoryKind::Stationery,
            CategoryDetails::Furniture(_) => CategoryKind::Furniture,
            CategoryDetails::Fabric(_) => CategoryKind::Fabric,
            CategoryDetails::FrameStructures(_) => CategoryKind::FrameStructures,
            CategoryDetails::Carpets(_) => CategoryKind::Carpets,
            CategoryDetails::ThermocolMaterials(_) => CategoryKind::ThermocolMaterials,
            CategoryDetails::MurtiSets(_) => CategoryKind::MurtiSets,
        }
    }

    /// A detail row with every attribute unset.
    pub fn empty(kind: CategoryKind) -> Self {
        match kind {
            CategoryKind::Stationery => CategoryDetails::Stationery(Default::default()),
            CategoryKind::Furniture => CategoryDetails::Furniture(Default::default()),
            CategoryKind::Fabric => CategoryDetails::Fabric(Default::default()),
            CategoryKind::FrameStructures => CategoryDetails::FrameStructures(Default::default()),
            CategoryKind::Carpets => CategoryDetails::Carpets(Default::default()),
            CategoryKind::ThermocolMaterials => {
                CategoryDetails::ThermocolMaterials(Default::default())
            }
            CategoryKind::MurtiSets => CategoryDetails::MurtiSets(Default::default()),
        }
    }

    /// Parses the `category_details` JSON object sent with a generic item.
    pub fn from_json(kind: CategoryKind, raw: &str) -> AppResult<Self> {
        fn parse<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
            serde_json::from_str(raw)
                .map_err(|_| AppError::Validation("Invalid category_details JSON format".to_string()))
        }

        Ok(match kind {
            CategoryKind::Stationery => CategoryDetails::Stationery(parse(raw)?),
            CategoryKind::Furniture => CategoryDetails::Furniture(parse(raw)?),
            CategoryKind::Fabric => CategoryDetails::Fabric(parse(raw)?),
            CategoryKind::FrameStructures => CategoryDetails::FrameStructures(parse(raw)?),
            CategoryKind::Carpets => CategoryDetails::Carpets(parse(raw)?),
            CategoryKind::ThermocolMaterials => CategoryDetails::ThermocolMaterials(parse(raw)?),
            CategoryKind::MurtiSets => CategoryDetails::MurtiSets(parse(raw)?),
        })
    }

    /// Reads the category's attributes from flat form fields, as sent to the
    /// per-category endpoints.
    pub fn from_form(kind: CategoryKind, form: &FormData) -> AppResult<Self> {
        Ok(match kind {
            CategoryKind::Stationery => CategoryDetails::Stationery(StationeryDetails::from_form(form)?),
            CategoryKind::Furniture => CategoryDetails::Furniture(FurnitureDetails::from_form(form)?),
            CategoryKind::Fabric => CategoryDetails::Fabric(FabricDetails::from_form(form)?),
            CategoryKind::FrameStructures => {
                CategoryDetails::FrameStructures(FrameStructureDetails::from_form(form)?)
            }
            CategoryKind::Carpets => CategoryDetails::Carpets(CarpetDetails::from_form(form)?),
            CategoryKind::ThermocolMaterials => {
                CategoryDetails::ThermocolMaterials(ThermocolDetails::from_form(form)?)
            }
            CategoryKind::MurtiSets => CategoryDetails::MurtiSets(MurtiSetDetails::from_form(form)?),
        })
    }

    pub fn ensure_required(&self) -> AppResult<()> {
        let missing = match self {
            CategoryDetails::Stationery(d) => d.missing_required(),
            CategoryDetails::Furniture(d) => d.missing_required(),
            CategoryDetails::Fabric(d) => d.missing_required(),
            CategoryDetails::FrameStructures(d) => d.missing_required(),
            CategoryDetails::Carpets(d) => d.missing_required(),
            CategoryDetails::ThermocolMaterials(d) => d.missing_required(),
            CategoryDetails::MurtiSets(d) => d.missing_required(),
        };
        match missing {
            Some(message) => Err(AppError::Validation(message.to_string())),
            None => Ok(()),
        }
    }

    /// Inserts or replaces the detail row for `item_id`.
    pub async fn save(&self, conn: &mut PgConnection, item_id: i32) -> AppResult<()> {
        match self {
            CategoryDetails::Stationery(d) => upsert(conn, item_id, d).await,
            CategoryDetails::Furniture(d) => upsert(conn, item_id, d).await,
            CategoryDetails::Fabric(d) => upsert(conn, item_id, d).await,
            CategoryDetails::FrameStructures(d) => upsert(conn, item_id, d).await,
            CategoryDetails::Carpets(d) => upsert(conn, item_id, d).await,
            CategoryDetails::ThermocolMaterials(d) => upsert(conn, item_id, d).await,
            CategoryDetails::MurtiSets(d) => upsert(conn, item_id, d).await,
        }
    }

    pub async fn fetch(
        conn: &mut PgConnection,
        kind: CategoryKind,
        item_id: i32,
    ) -> AppResult<Option<Self>> {
        Ok(match kind {
            CategoryKind::Stationery => fetch_one(conn, item_id).await?.map(CategoryDetails::Stationery),
            CategoryKind::Furniture => fetch_one(conn, item_id).await?.map(CategoryDetails::Furniture),
            CategoryKind::Fabric => fetch_one(conn, item_id).await?.map(CategoryDetails::Fabric),
            CategoryKind::FrameStructures => {
                fetch_one(conn, item_id).await?.map(CategoryDetails::FrameStructures)
            }
            CategoryKind::Carpets => fetch_one(conn, item_id).await?.map(CategoryDetails::Carpets),
            CategoryKind::ThermocolMaterials => {
                fetch_one(conn, item_id).await?.map(CategoryDetails::ThermocolMaterials)
            }
            CategoryKind::MurtiSets => fetch_one(conn, item_id).await?.map(CategoryDetails::MurtiSets),
        })
    }

    /// Every detail row of one category, keyed by item id.
    pub async fn fetch_category(
        conn: &mut PgConnection,
        kind: CategoryKind,
    ) -> AppResult<HashMap<i32, Self>> {
        Ok(match kind {
            CategoryKind::Stationery => collect(fetch_all::<StationeryDetails>(conn).await?, |d| d.item_id, CategoryDetails::Stationery),
            CategoryKind::Furniture => collect(fetch_all::<FurnitureDetails>(conn).await?, |d| d.item_id, CategoryDetails::Furniture),
            CategoryKind::Fabric => collect(fetch_all::<FabricDetails>(conn).await?, |d| d.item_id, CategoryDetails::Fabric),
            CategoryKind::FrameStructures => collect(fetch_all::<FrameStructureDetails>(conn).await?, |d| d.item_id, CategoryDetails::FrameStructures),
            CategoryKind::Carpets => collect(fetch_all::<CarpetDetails>(conn).await?, |d| d.item_id, CategoryDetails::Carpets),
            CategoryKind::ThermocolMaterials => collect(fetch_all::<ThermocolDetails>(conn).await?, |d| d.item_id, CategoryDetails::ThermocolMaterials),
            CategoryKind::MurtiSets => collect(fetch_all::<MurtiSetDetails>(conn).await?, |d| d.item_id, CategoryDetails::MurtiSets),
        })
    }

    /// Removes the detail row of `item_id` from the category's table.
    pub async fn delete(conn: &mut PgConnection, kind: CategoryKind, item_id: i32) -> AppResult<u64> {
        let sql = format!("DELETE FROM {} WHERE item_id = $1", kind.table());
        let result = sqlx::query(&sql).bind(item_id).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}

fn collect<T>(
    rows: Vec<T>,
    item_id: impl Fn(&T) -> i32,
    wrap: impl Fn(T) -> CategoryDetails,
) -> HashMap<i32, CategoryDetails> {
    rows.into_iter().map(|row| (item_id(&row), wrap(row))).collect()
}

fn select_sql<T: DetailRow>() -> String {
    format!(
        "SELECT item_id, {} FROM {}",
        T::COLUMNS.join(", "),
        T::KIND.table()
    )
}

async fn fetch_one<T: DetailRow>(conn: &mut PgConnection, item_id: i32) -> AppResult<Option<T>> {
    let sql = format!("{} WHERE item_id = $1", select_sql::<T>());
    let row = sqlx::query_as::<_, T>(&sql)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

async fn fetch_all<T: DetailRow>(conn: &mut PgConnection) -> AppResult<Vec<T>> {
    let sql = select_sql::<T>();
    let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&mut *conn).await?;
    Ok(rows)
}

async fn upsert<T: DetailRow>(conn: &mut PgConnection, item_id: i32, details: &T) -> AppResult<()> {
    let table = T::KIND.table();
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} (item_id, {}) VALUES (",
        table,
        T::COLUMNS.join(", ")
    ));
    {
        let mut values = builder.separated(", ");
        values.push_bind(item_id);
        details.push_values(&mut values);
    }
    builder.push(") ON CONFLICT (item_id) DO UPDATE SET ");
    let assignments: Vec<String> = T::COLUMNS
        .iter()
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect();
    builder.push(assignments.join(", "));

    builder.build().execute(&mut *conn).await?;
    Ok(())
}
