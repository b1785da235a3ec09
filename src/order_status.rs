use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Lifecycle of a paid order. Stored in the database as the Korean label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    #[serde(rename = "결제완료")]
    Paid,
    #[serde(rename = "배송요청")]
    DeliveryRequested,
    #[serde(rename = "배송완료")]
    Delivered,
    #[serde(rename = "결제취소")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Paid,
        OrderStatus::DeliveryRequested,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Paid => "결제완료",
            OrderStatus::DeliveryRequested => "배송요청",
            OrderStatus::Delivered => "배송완료",
            OrderStatus::Cancelled => "결제취소",
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Paid, DeliveryRequested)
                | (Paid, Delivered)
                | (Paid, Cancelled)
                | (DeliveryRequested, Delivered)
                | (DeliveryRequested, Cancelled)
        )
    }

    pub fn transition(self, next: OrderStatus) -> Result<OrderStatus, AppError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::BadRequest(format!(
                "cannot change order status from {self} to {next}"
            )))
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Invalid order status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_korean_labels() {
        assert_eq!("결제완료".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!(" 배송완료 ".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn delivery_flow_is_allowed() {
        let status = OrderStatus::Paid
            .transition(OrderStatus::DeliveryRequested)
            .and_then(|s| s.transition(OrderStatus::Delivered))
            .unwrap();
        assert_eq!(status, OrderStatus::Delivered);
    }

    #[test]
    fn terminal_states_do_not_move() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn cannot_go_back_to_paid() {
        assert!(
            OrderStatus::DeliveryRequested
                .transition(OrderStatus::Paid)
                .is_err()
        );
    }
}
