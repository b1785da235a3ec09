use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{CreateReviewRequest, ReviewList},
    entity::{
        orders::Entity as Orders,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    uploads::{self, MultipartForm},
    state::AppState,
};

pub const PHOTO_FIELD: &str = "photo";
const MAX_CONTENT_LEN: usize = 2000;

impl CreateReviewRequest {
    pub fn from_form(form: &MultipartForm) -> AppResult<Self> {
        let rating = form
            .field("rating")
            .ok_or_else(|| AppError::BadRequest("rating is required".into()))?
            .parse::<i32>()
            .map_err(|_| AppError::BadRequest("rating must be a number".into()))?;
        let content = form.field("content").unwrap_or_default().to_string();
        Ok(Self { rating, content })
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".into()));
        }
        if self.content.trim().is_empty() {
            return Err(AppError::BadRequest("content is required".into()));
        }
        if self.content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::BadRequest("content is too long".into()));
        }
        Ok(())
    }
}

/// Review a delivered order. Only the buyer can review, once per order.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    form: MultipartForm,
) -> AppResult<ApiResponse<Review>> {
    let payload = CreateReviewRequest::from_form(&form)?;
    payload.validate()?;

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    let status: OrderStatus = order.status.parse()?;
    if status != OrderStatus::Delivered {
        return Err(AppError::BadRequest("Only delivered orders can be reviewed".into()));
    }

    let exists = Reviews::find()
        .filter(ReviewCol::OrderId.eq(order_id))
        .count(&state.orm)
        .await?;
    if exists > 0 {
        return Err(AppError::Conflict("Order already reviewed".into()));
    }

    let photo_url = match form.file.as_ref() {
        Some(file) => Some(uploads::store_image(&state.config.upload_dir, "reviews", file).await?),
        None => None,
    };

    let inserted = ReviewActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(user.user_id),
        product_summary: Set(order.product_details),
        rating: Set(payload.rating),
        content: Set(payload.content.trim().to_string()),
        photo_url: Set(photo_url.clone()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await;

    let review = match inserted {
        Ok(review) => review,
        Err(err) => {
            if let Some(url) = &photo_url {
                uploads::remove_image(&state.config.upload_dir, url).await;
            }
            // A concurrent review for the same order lost the race.
            return Err(match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("Order already reviewed".into())
                }
                _ => err.into(),
            });
        }
    };

    audit::record(
        state,
        Some(user.user_id),
        "review_create",
        "reviews",
        serde_json::json!({ "review_id": review.id, "order_id": order_id }),
    )
    .await;

    Ok(ApiResponse::success("Review created", Review::from(review), Some(Meta::empty())))
}

pub async fn list_reviews(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Reviews::find().order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> MultipartForm {
        MultipartForm {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            file: None,
        }
    }

    #[test]
    fn rating_must_be_in_range() {
        let req = CreateReviewRequest::from_form(&form(&[("rating", "6"), ("content", "좋아요")]))
            .unwrap();
        assert!(req.validate().is_err());

        let req = CreateReviewRequest::from_form(&form(&[("rating", "5"), ("content", "좋아요")]))
            .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_rating_is_rejected() {
        assert!(CreateReviewRequest::from_form(&form(&[("content", "맛있어요")])).is_err());
        assert!(CreateReviewRequest::from_form(&form(&[("rating", "five")])).is_err());
    }
}
