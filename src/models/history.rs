use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::issuance::{IssuanceRecord, TransactionType};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ItemHistorySummary {
    pub total_transactions: usize,
    pub total_issued: Decimal,
    pub total_returned: Decimal,
    pub net_issued: Decimal,
    pub current_stock: Decimal,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EventHistorySummary {
    pub total_transactions: usize,
    pub total_items_used: usize,
    pub total_quantity_issued: Decimal,
    pub total_quantity_returned: Decimal,
    pub net_quantity_issued: Decimal,
    pub categories_used: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemInfo {
    pub id: i32,
    pub name: Option<String>,
    pub category_name: Option<String>,
    pub unit: Option<String>,
    pub storage_location: Option<String>,
    pub item_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemTransaction {
    pub id: i32,
    pub transaction_type: TransactionType,
    pub quantity_issued: Decimal,
    pub notes: Option<String>,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemIssuances {
    pub item_info: ItemInfo,
    pub transactions: Vec<ItemTransaction>,
}

/// Sums of OUT and IN quantities over `records`.
fn totals(records: &[IssuanceRecord]) -> (Decimal, Decimal) {
    records
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(issued, returned), record| {
            match record.transaction_type {
                TransactionType::Out => (issued + record.quantity_issued, returned),
                TransactionType::In => (issued, returned + record.quantity_issued),
            }
        })
}

pub fn summarize_item(records: &[IssuanceRecord], current_stock: Decimal) -> ItemHistorySummary {
    let (total_issued, total_returned) = totals(records);
    ItemHistorySummary {
        total_transactions: records.len(),
        total_issued,
        total_returned,
        net_issued: total_issued - total_returned,
        current_stock,
    }
}

pub fn summarize_event(records: &[IssuanceRecord]) -> EventHistorySummary {
    let (total_quantity_issued, total_quantity_returned) = totals(records);

    let mut items: Vec<i32> = records.iter().map(|record| record.item_id).collect();
    items.sort_unstable();
    items.dedup();

    // first-seen order
    let mut categories_used: Vec<String> = Vec::new();
    for name in records.iter().filter_map(|record| record.category_name.as_ref()) {
        if !categories_used.contains(name) {
            categories_used.push(name.clone());
        }
    }

    EventHistorySummary {
        total_transactions: records.len(),
        total_items_used: items.len(),
        total_quantity_issued,
        total_quantity_returned,
        net_quantity_issued: total_quantity_issued - total_quantity_returned,
        categories_used,
    }
}

/// Groups records by item, keeping the order in which items first appear.
pub fn group_by_item(records: &[IssuanceRecord]) -> Vec<ItemIssuances> {
    let mut groups: Vec<ItemIssuances> = Vec::new();
    for record in records {
        let transaction = ItemTransaction {
            id: record.id,
            transaction_type: record.transaction_type,
            quantity_issued: record.quantity_issued,
            notes: record.notes.clone(),
            issued_at: record.issued_at,
        };
        match groups.iter_mut().find(|group| group.item_info.id == record.item_id) {
            Some(group) => group.transactions.push(transaction),
            None => groups.push(ItemIssuances {
                item_info: ItemInfo {
                    id: record.item_id,
                    name: record.item_name.clone(),
                    category_name: record.category_name.clone(),
                    unit: record.unit.clone(),
                    storage_location: record.storage_location.clone(),
                    item_image: record.item_image.clone(),
                },
                transactions: vec![transaction],
            }),
        }
    }
    groups
}
