use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Settlement;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingSettlement {
    pub category: String,
    pub manager_email: Option<String>,
    pub tax_type: String,
    pub item_count: i32,
    pub order_count: i32,
    pub sales_amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PendingSettlementList {
    #[schema(value_type = Vec<PendingSettlement>)]
    pub items: Vec<PendingSettlement>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettleRequest {
    pub category: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SettlementList {
    #[schema(value_type = Vec<Settlement>)]
    pub items: Vec<Settlement>,
}
