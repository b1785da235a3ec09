use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        orders::{
            CancelOrderRequest, CheckoutRequest, ConfirmPaymentRequest, OrderList, OrderWithItems,
            PaymentRequest,
        },
        reviews::ReviewForm,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{order_service, review_service},
    state::AppState,
    uploads::MultipartForm,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/confirm", post(confirm_payment))
        .route("/{id}", get(get_order))
        .route("/{id}/cancel", post(cancel_order))
        .route("/{id}/review", post(create_review))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "결제완료, 배송요청, 배송완료, 결제취소"),
        ("sort_order" = Option<String>, Query, description = "asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of the current member", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment request for the widget", body = ApiResponse<PaymentRequest>),
        (status = 400, description = "Empty cart, stock or delivery area problem")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<CheckoutRequest>>,
) -> AppResult<Json<ApiResponse<PaymentRequest>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 201, description = "Payment confirmed and order placed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Amount mismatch, gateway rejection or stock shortage"),
        (status = 409, description = "Order id belongs to another member")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let resp = order_service::confirm_payment(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled and refunded", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Order is already in delivery or closed"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelOrderRequest>>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = order_service::cancel_order(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/review",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body(content = ReviewForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Review created", body = ApiResponse<Review>),
        (status = 400, description = "Order not delivered or invalid input"),
        (status = 403, description = "Not your order"),
        (status = 409, description = "Already reviewed")
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Review>>)> {
    let form = MultipartForm::read(multipart, review_service::PHOTO_FIELD).await?;
    let resp = review_service::create_review(&state, &user, id, form).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
