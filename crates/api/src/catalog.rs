use std::collections::HashMap;

use async_graphql::{Enum, InputObject, SimpleObject};
use entity::{invoice_line, product, service};
use platform_api::{ApiError, ApiResult};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db_err;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    #[graphql(name = "SERVICE")]
    Service,
    #[graphql(name = "PRODUCT")]
    Product,
}

impl From<ItemKind> for invoice_line::ItemKind {
    fn from(value: ItemKind) -> Self {
        match value {
            ItemKind::Service => invoice_line::ItemKind::Service,
            ItemKind::Product => invoice_line::ItemKind::Product,
        }
    }
}

impl From<invoice_line::ItemKind> for ItemKind {
    fn from(value: invoice_line::ItemKind) -> Self {
        match value {
            invoice_line::ItemKind::Service => ItemKind::Service,
            invoice_line::ItemKind::Product => ItemKind::Product,
        }
    }
}

/// Reference to a catalog entry, as stored in `items` columns.
#[derive(SimpleObject, InputObject, Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[graphql(input_name = "LineItemInput")]
#[serde(rename_all = "camelCase")]
pub struct LineItemRef {
    pub kind: ItemKind,
    pub item_id: Uuid,
}

pub fn encode_items(items: &[LineItemRef]) -> serde_json::Value {
    serde_json::to_value(items).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}

/// Entries that do not parse are skipped.
pub fn decode_items(value: &serde_json::Value) -> Vec<LineItemRef> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricedItem {
    pub item: LineItemRef,
    pub name: String,
    pub unit_price_cents: i64,
}

/// Resolve each reference against the tenant's catalog. Unknown or foreign ids fail.
pub async fn price_items<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    items: &[LineItemRef],
) -> ApiResult<Vec<PricedItem>> {
    let ids_of = |kind: ItemKind| -> Vec<Uuid> {
        items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.item_id)
            .collect()
    };
    let service_ids = ids_of(ItemKind::Service);
    let product_ids = ids_of(ItemKind::Product);

    let mut catalog: HashMap<(ItemKind, Uuid), (String, i64)> = HashMap::new();
    if !service_ids.is_empty() {
        let services = service::Entity::find()
            .filter(service::Column::BusinessId.eq(business_id))
            .filter(service::Column::Id.is_in(service_ids))
            .all(conn)
            .await
            .map_err(db_err)?;
        for record in services {
            catalog.insert(
                (ItemKind::Service, record.id),
                (record.name, record.price_cents),
            );
        }
    }
    if !product_ids.is_empty() {
        let products = product::Entity::find()
            .filter(product::Column::BusinessId.eq(business_id))
            .filter(product::Column::Id.is_in(product_ids))
            .all(conn)
            .await
            .map_err(db_err)?;
        for record in products {
            catalog.insert(
                (ItemKind::Product, record.id),
                (record.name, record.price_cents),
            );
        }
    }

    items
        .iter()
        .map(|item| {
            let (name, price) = catalog.get(&(item.kind, item.item_id)).ok_or_else(|| {
                ApiError::validation(format!("unknown catalog item {}", item.item_id))
            })?;
            Ok(PricedItem {
                item: *item,
                name: name.clone(),
                unit_price_cents: *price,
            })
        })
        .collect()
}

pub fn total_cents(priced: &[PricedItem]) -> i64 {
    priced.iter().map(|p| p.unit_price_cents).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_are_stored_with_camel_case_keys() {
        let id = Uuid::new_v4();
        let encoded = encode_items(&[LineItemRef {
            kind: ItemKind::Product,
            item_id: id,
        }]);
        assert_eq!(encoded, json!([{ "kind": "PRODUCT", "itemId": id }]));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let id = Uuid::new_v4();
        let decoded = decode_items(&json!([
            { "kind": "SERVICE", "itemId": id },
            { "kind": "GIFT", "itemId": id },
            "nonsense"
        ]));
        assert_eq!(
            decoded,
            vec![LineItemRef {
                kind: ItemKind::Service,
                item_id: id
            }]
        );
        assert!(decode_items(&json!({ "kind": "SERVICE" })).is_empty());
    }
}
