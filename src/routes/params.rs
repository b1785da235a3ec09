use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

/// Query strings reach flattened structs as text, so numbers may arrive
/// either way.
pub fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Option::<Raw<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid number: {s}"))),
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    #[serde(default, deserialize_with = "lenient_number")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
    Deadline,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub q: Option<String>,
    /// Category name.
    pub cat: Option<String>,
    /// Sub-category name.
    pub sub: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_price: Option<i64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapped {
        #[serde(flatten)]
        pagination: Pagination,
        #[serde(default, deserialize_with = "lenient_number")]
        min_price: Option<i64>,
    }

    #[test]
    fn flattened_numbers_parse_from_text() {
        let query: ProductQuery =
            serde_json::from_value(serde_json::json!({ "page": "2", "min_price": "1000" })).unwrap();
        assert_eq!(query.pagination.normalize(), (2, 20, 20));
        assert_eq!(query.min_price, Some(1000));

        let wrapped: Wrapped =
            serde_json::from_value(serde_json::json!({ "per_page": 5, "min_price": "" })).unwrap();
        assert_eq!(wrapped.pagination.per_page, Some(5));
        assert_eq!(wrapped.min_price, None);
    }
}
