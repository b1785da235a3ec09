use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::settlements::{PendingSettlement, PendingSettlementList, SettleRequest, SettlementList},
    entity::{
        categories::{Column as CatCol, Entity as Categories},
        order_items::{self, Column as ItemCol, Entity as OrderItems, Model as ItemModel},
        orders::Column as OrderCol,
        settlements::{ActiveModel as SettlementActive, Column as SettlementCol, Entity as Settlements},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Settlement, TAX_TAXABLE},
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Unsettled lines of delivered orders, optionally limited to one category.
async fn pending_items<C: ConnectionTrait>(
    conn: &C,
    category: Option<&str>,
) -> AppResult<Vec<ItemModel>> {
    let mut finder = OrderItems::find()
        .join(JoinType::InnerJoin, order_items::Relation::Orders.def())
        .filter(ItemCol::SettlementId.is_null())
        .filter(OrderCol::Status.eq(OrderStatus::Delivered.as_str()));
    if let Some(category) = category {
        finder = finder.filter(ItemCol::Category.eq(category));
    }
    Ok(finder.order_by_asc(ItemCol::CreatedAt).all(conn).await?)
}

/// Per-category totals, categories in name order.
pub fn summarize(items: &[ItemModel]) -> Vec<PendingSettlement> {
    let mut grouped: BTreeMap<&str, (i32, HashSet<Uuid>, i64)> = BTreeMap::new();
    for item in items {
        let entry = grouped
            .entry(item.category.as_str())
            .or_insert_with(|| (0, HashSet::new(), 0));
        entry.0 += item.quantity;
        entry.1.insert(item.order_id);
        entry.2 += item.price * i64::from(item.quantity);
    }

    grouped
        .into_iter()
        .map(|(category, (item_count, orders, sales_amount))| PendingSettlement {
            category: category.to_string(),
            manager_email: None,
            tax_type: TAX_TAXABLE.to_string(),
            item_count,
            order_count: orders.len() as i32,
            sales_amount,
        })
        .collect()
}

async fn with_category_info<C: ConnectionTrait>(
    conn: &C,
    mut rows: Vec<PendingSettlement>,
) -> AppResult<Vec<PendingSettlement>> {
    if rows.is_empty() {
        return Ok(rows);
    }
    let names: Vec<String> = rows.iter().map(|r| r.category.clone()).collect();
    let categories = Categories::find()
        .filter(CatCol::Name.is_in(names))
        .all(conn)
        .await?;
    for row in rows.iter_mut() {
        if let Some(cat) = categories.iter().find(|c| c.name == row.category) {
            row.manager_email = cat.manager_email.clone();
            row.tax_type = cat.tax_type.clone();
        }
    }
    Ok(rows)
}

pub async fn list_pending(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PendingSettlementList>> {
    ensure_admin(user)?;
    let items = pending_items(&state.orm, None).await?;
    let rows = with_category_info(&state.orm, summarize(&items)).await?;
    Ok(ApiResponse::success(
        "Pending settlements",
        PendingSettlementList { items: rows },
        Some(Meta::empty()),
    ))
}

/// Close out everything pending for one category.
pub async fn settle_category(
    state: &AppState,
    user: &AuthUser,
    payload: SettleRequest,
) -> AppResult<ApiResponse<Settlement>> {
    ensure_admin(user)?;
    let category = payload.category.trim();
    if category.is_empty() {
        return Err(AppError::BadRequest("category is required".into()));
    }

    let txn = state.orm.begin().await?;
    let items = pending_items(&txn, Some(category)).await?;
    let summary = with_category_info(&txn, summarize(&items))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest(format!("Nothing to settle for {category}")))?;

    let settlement = SettlementActive {
        id: Set(Uuid::new_v4()),
        category: Set(summary.category),
        manager_email: Set(summary.manager_email),
        tax_type: Set(summary.tax_type),
        item_count: Set(summary.item_count),
        order_count: Set(summary.order_count),
        sales_amount: Set(summary.sales_amount),
        created_by: Set(user.user_id),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    OrderItems::update_many()
        .col_expr(ItemCol::SettlementId, Expr::value(settlement.id))
        .filter(ItemCol::Id.is_in(ids))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(
        category = %settlement.category,
        amount = settlement.sales_amount,
        "category settled"
    );
    audit::record(
        state,
        Some(user.user_id),
        "settlement_create",
        "settlements",
        serde_json::json!({
            "settlement_id": settlement.id,
            "category": settlement.category,
            "sales_amount": settlement.sales_amount,
        }),
    )
    .await;

    Ok(ApiResponse::success("Settled", Settlement::from(settlement), Some(Meta::empty())))
}

pub async fn list_settlements(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<SettlementList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let finder = Settlements::find().order_by_desc(SettlementCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Settlement::from)
        .collect();

    Ok(ApiResponse::success(
        "Settlements",
        SettlementList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, order_id: Uuid, price: i64, quantity: i32) -> ItemModel {
        ItemModel {
            id: Uuid::new_v4(),
            order_id,
            product_id: None,
            product_name: "상품".into(),
            category: category.into(),
            price,
            quantity,
            settlement_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn summary_counts_distinct_orders() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let items = vec![
            item("채소", first, 1000, 2),
            item("채소", first, 500, 1),
            item("채소", second, 1000, 1),
            item("과일", second, 3000, 3),
        ];

        let rows = summarize(&items);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "과일");
        assert_eq!(rows[0].sales_amount, 9000);
        assert_eq!(rows[1].category, "채소");
        assert_eq!(rows[1].item_count, 4);
        assert_eq!(rows[1].order_count, 2);
        assert_eq!(rows[1].sales_amount, 3500);
    }
}
