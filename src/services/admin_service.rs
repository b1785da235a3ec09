use chrono::{FixedOffset, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{InventoryAdjustRequest, LowStockQuery, OrderExportQuery, UpdateOrderStatusRequest},
        orders::{OrderList, OrderWithItems},
        products::ProductList,
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    excel::{self, OrderReportRow},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service::{self, change_status, parse_status_filter},
    state::AppState,
};

const DEFAULT_LOW_STOCK: i32 = 5;
const ADMIN_CANCEL_REASON: &str = "관리자 취소";

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (orders, meta) = order_service::paginate_orders(state, Condition::all(), query).await?;
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let data = order_service::load_order_with_items(state, id).await?;
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let reason = payload
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| ADMIN_CANCEL_REASON.to_string());
    let order = change_status(state, user, existing, payload.status, &reason).await?;

    let data = order_service::load_order_with_items(state, order.id).await?;
    Ok(ApiResponse::success("Order updated", data, Some(Meta::empty())))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK);
    let (page, limit, offset) = query.pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    // Single guarded statement so concurrent orders cannot push stock negative.
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(payload.delta))
        .filter(
            Condition::all()
                .add(ProdCol::Id.eq(product.id))
                .add(ProdCol::Stock.gte(-payload.delta)),
        )
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::BadRequest("stock cannot be negative".into()));
    }

    let updated = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        state,
        Some(user.user_id),
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        Product::from(updated),
        Some(Meta::empty()),
    ))
}

fn kst_day_start(date: NaiveDate, offset: FixedOffset) -> AppResult<chrono::DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::BadRequest("invalid date".into()))
}

/// Orders report as an xlsx workbook. Returns the download filename and bytes.
pub async fn export_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderExportQuery,
) -> AppResult<(String, Vec<u8>)> {
    ensure_admin(user)?;
    let offset = excel::kst()?;

    let mut condition = Condition::all();
    if let Some(from) = query.from {
        condition = condition.add(OrderCol::CreatedAt.gte(kst_day_start(from, offset)?));
    }
    if let Some(to) = query.to {
        let next = to
            .succ_opt()
            .ok_or_else(|| AppError::BadRequest("invalid date".into()))?;
        condition = condition.add(OrderCol::CreatedAt.lt(kst_day_start(next, offset)?));
    }
    if let Some(status) = parse_status_filter(query.status.as_ref())? {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let rows: Vec<OrderReportRow> = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|order| OrderReportRow {
            order_number: order.order_number,
            created_at: order.created_at.with_timezone(&Utc),
            customer: order.delivery_name,
            phone: order.delivery_phone,
            address: format!("{} {}", order.delivery_address, order.delivery_address_detail)
                .trim()
                .to_string(),
            details: order.product_details,
            items_amount: order.items_amount,
            delivery_fee: order.delivery_fee,
            total_amount: order.total_amount,
            status: order.status,
        })
        .collect();

    let bytes = excel::orders_workbook(&rows)?;
    tracing::info!(rows = rows.len(), "orders exported");
    Ok((excel::orders_filename(Utc::now().with_timezone(&offset)), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_range_starts_at_kst_midnight() {
        let offset = excel::kst().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let start = kst_day_start(date, offset).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-01T15:00:00+00:00");
    }
}
