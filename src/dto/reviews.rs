use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Review;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<Review>)]
    pub items: Vec<Review>,
}

/// Multipart body of a review submission.
#[derive(Debug, ToSchema)]
pub struct ReviewForm {
    pub rating: i32,
    pub content: String,
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub photo: Option<Vec<u8>>,
}
