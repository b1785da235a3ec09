use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartGroup {
    pub category: String,
    pub items: Vec<CartItemDto>,
    pub subtotal: i64,
    pub delivery_fee: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub groups: Vec<CartGroup>,
    pub items_amount: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
}
