use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    order_status::OrderStatus,
    routes::params::{Pagination, lenient_number},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    /// Sent to the payment gateway when the new status is a cancellation.
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LowStockQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    #[serde(default, deserialize_with = "lenient_number")]
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}

/// Date range for the order export, inclusive, in KST.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderExportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
}
