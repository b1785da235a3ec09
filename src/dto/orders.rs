use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub request_memo: Option<String>,
}

/// What the browser hands to the payment widget.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentRequest {
    pub order_id: String,
    pub order_name: String,
    pub amount: i64,
    pub items_amount: i64,
    pub delivery_fee: i64,
    pub customer_email: String,
    pub customer_name: String,
    /// Echoed back so the widget can return it with the confirmation.
    pub request_memo: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub payment_key: String,
    pub order_id: String,
    pub amount: i64,
    pub request_memo: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
