pub mod category;
pub mod details;
pub mod gallery;
pub mod history;
pub mod issuance;
pub mod item;
pub mod stock;

pub use category::{Category, CategoryKind};
pub use details::CategoryDetails;
pub use issuance::{
    IssuanceChanges, IssuanceRecord, MaterialIssuance, NewIssuance, TransactionType,
};
pub use item::{InventoryItem, ItemChanges, NewItem};
pub use stock::Stock;
