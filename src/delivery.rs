//! Delivery fee policy (배송비 티어).
//!
//! Every category in a basket ships separately. A category pays one
//! [`FEE_PER_TIER`] for each started bracket of [`TIER_SPAN`] won, so a
//! subtotal of exactly 50,000 is still one tier and 50,001 starts the second.

use serde::Serialize;
use utoipa::ToSchema;

pub const FEE_PER_TIER: i64 = 1900;
pub const TIER_SPAN: i64 = 50_001;

pub fn category_fee(subtotal: i64) -> i64 {
    let subtotal = subtotal.max(0);
    (subtotal / TIER_SPAN + 1) * FEE_PER_TIER
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryFee {
    pub category: String,
    pub subtotal: i64,
    pub fee: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeliveryQuote {
    pub per_category: Vec<CategoryFee>,
    pub items_amount: i64,
    pub delivery_fee: i64,
}

impl DeliveryQuote {
    pub fn total(&self) -> i64 {
        self.items_amount + self.delivery_fee
    }
}

/// Build a quote from `(category, line amount)` pairs. Categories keep the
/// order in which they first appear.
pub fn quote<'a, I>(lines: I) -> DeliveryQuote
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut per_category: Vec<CategoryFee> = Vec::new();
    for (category, amount) in lines {
        match per_category.iter_mut().find(|c| c.category == category) {
            Some(entry) => entry.subtotal += amount,
            None => per_category.push(CategoryFee {
                category: category.to_string(),
                subtotal: amount,
                fee: 0,
            }),
        }
    }

    for entry in &mut per_category {
        entry.fee = category_fee(entry.subtotal);
    }

    DeliveryQuote {
        items_amount: per_category.iter().map(|c| c.subtotal).sum(),
        delivery_fee: per_category.iter().map(|c| c.fee).sum(),
        per_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(category_fee(1), 1900);
        assert_eq!(category_fee(50_000), 1900);
        assert_eq!(category_fee(50_001), 3800);
        assert_eq!(category_fee(100_001), 3800);
        assert_eq!(category_fee(100_002), 5700);
    }

    #[test]
    fn fee_is_summed_per_category() {
        let q = quote([("채소", 30_000), ("과일", 10_000), ("채소", 25_000)]);
        assert_eq!(q.per_category.len(), 2);
        assert_eq!(q.per_category[0].category, "채소");
        assert_eq!(q.per_category[0].subtotal, 55_000);
        assert_eq!(q.per_category[0].fee, 3800);
        assert_eq!(q.per_category[1].fee, 1900);
        assert_eq!(q.items_amount, 65_000);
        assert_eq!(q.delivery_fee, 5700);
        assert_eq!(q.total(), 70_700);
    }

    #[test]
    fn empty_basket_has_no_fee() {
        let q = quote(std::iter::empty());
        assert_eq!(q.delivery_fee, 0);
        assert_eq!(q.total(), 0);
    }
}
