use crate::models::{Item, ItemInput};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Body for POST and PUT on catalog items. The non-negative price rule
/// is enforced in the handler since `validator` ranges do not cover
/// `Decimal`.
#[derive(Debug, Deserialize, Validate)]
pub struct ItemRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    pub price: Decimal,
}

impl From<ItemRequest> for ItemInput {
    fn from(req: ItemRequest) -> Self {
        Self {
            name: req.name,
            price: req.price,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(i: Item) -> Self {
        Self {
            id: i.item_id,
            name: i.name,
            price: i.price,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}
