use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    cart_items, categories, order_items, orders, products, reviews, settlements, users,
};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

pub const GRADE_RETAIL: &str = "RETAIL";
pub const GRADE_WHOLESALE: &str = "WHOLESALE";

pub const TAX_TAXABLE: &str = "과세";
pub const TAX_FREE: &str = "면세";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub address_detail: String,
    pub entrance_code: String,
    pub grade: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            phone: model.phone,
            address: model.address,
            address_detail: model.address_detail,
            entrance_code: model.entrance_code,
            grade: model.grade,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub manager_email: Option<String>,
    pub tax_type: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
            manager_email: model.manager_email,
            tax_type: model.tax_type,
            sort_order: model.sort_order,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_retail: i64,
    pub price_wholesale: Option<i64>,
    pub category: String,
    pub sub_category: Option<String>,
    pub stock: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price_retail: model.price_retail,
            price_wholesale: model.price_wholesale,
            category: model.category,
            sub_category: model.sub_category,
            stock: model.stock,
            deadline: model.deadline.map(|dt| dt.with_timezone(&Utc)),
            image_url: model.image_url,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Price a member pays for one unit: wholesale members get the wholesale
/// price when the product has one.
pub fn unit_price(product: &products::Model, grade: &str) -> i64 {
    match product.price_wholesale {
        Some(wholesale) if grade == GRADE_WHOLESALE => wholesale,
        _ => product.price_retail,
    }
}

/// Whether the product can still be ordered at `now`.
pub fn is_orderable(product: &products::Model, now: DateTime<Utc>) -> bool {
    product.is_active
        && product
            .deadline
            .is_none_or(|deadline| deadline.with_timezone(&Utc) > now)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl From<cart_items::Model> for CartItem {
    fn from(model: cart_items::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub product_details: String,
    pub items_amount: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub status: String,
    pub delivery_name: String,
    pub delivery_phone: String,
    pub delivery_address: String,
    pub delivery_address_detail: String,
    pub entrance_code: String,
    pub request_memo: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            product_details: model.product_details,
            items_amount: model.items_amount,
            delivery_fee: model.delivery_fee,
            total_amount: model.total_amount,
            status: model.status,
            delivery_name: model.delivery_name,
            delivery_phone: model.delivery_phone,
            delivery_address: model.delivery_address,
            delivery_address_detail: model.delivery_address_detail,
            entrance_code: model.entrance_code,
            request_memo: model.request_memo,
            paid_at: model.paid_at.with_timezone(&Utc),
            cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub category: String,
    pub price: i64,
    pub quantity: i32,
    pub settled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            category: model.category,
            price: model.price,
            quantity: model.quantity,
            settled: model.settlement_id.is_some(),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub product_summary: String,
    pub rating: i32,
    pub content: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<reviews::Model> for Review {
    fn from(model: reviews::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            user_id: model.user_id,
            product_summary: model.product_summary,
            rating: model.rating,
            content: model.content,
            photo_url: model.photo_url,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Settlement {
    pub id: Uuid,
    pub category: String,
    pub manager_email: Option<String>,
    pub tax_type: String,
    pub item_count: i32,
    pub order_count: i32,
    pub sales_amount: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<settlements::Model> for Settlement {
    fn from(model: settlements::Model) -> Self {
        Self {
            id: model.id,
            category: model.category,
            manager_email: model.manager_email,
            tax_type: model.tax_type,
            item_count: model.item_count,
            order_count: model.order_count,
            sales_amount: model.sales_amount,
            created_by: model.created_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
