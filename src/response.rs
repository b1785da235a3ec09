use serde::Serialize;
use utoipa::ToSchema;

/// Paging block attached to list responses. Single-resource responses send
/// an empty one.
#[derive(Debug, Serialize, ToSchema, Clone, Default)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
            total_pages: Some(total_pages),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Meta::new(1, 20, 41).total_pages, Some(3));
        assert_eq!(Meta::new(1, 20, 40).total_pages, Some(2));
        assert_eq!(Meta::new(1, 20, 0).total_pages, Some(0));
    }

    #[test]
    fn empty_meta_serializes_to_empty_object() {
        let json = serde_json::to_value(Meta::empty()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
