use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::categories::CategoryTree,
    error::AppResult,
    response::ApiResponse,
    services::category_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories with their sub-categories", body = ApiResponse<CategoryTree>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryTree>>> {
    let resp = category_service::list_tree(&state).await?;
    Ok(Json(resp))
}
