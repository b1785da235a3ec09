use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{excel::ImportIssue, models::Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_retail: i64,
    pub price_wholesale: Option<i64>,
    pub category: String,
    pub sub_category: Option<String>,
    pub stock: i32,
    pub deadline: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_retail: Option<i64>,
    pub price_wholesale: Option<i64>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub stock: Option<i32>,
    pub deadline: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductImportResult {
    pub created: usize,
    pub skipped: Vec<ImportIssue>,
}

/// Multipart body carrying a single `file` field.
#[derive(Debug, ToSchema)]
pub struct FileUpload {
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: Vec<u8>,
}
