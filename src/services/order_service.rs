use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    prelude::DateTimeWithTimeZone,
    sea_query::{Expr, IntoCondition},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        cart::CartView,
        orders::{
            CancelOrderRequest, CheckoutRequest, ConfirmPaymentRequest, OrderList, OrderWithItems,
            PaymentRequest,
        },
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Model as CartModel},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
        users::Model as UserModel,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, is_orderable},
    order_details,
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        auth_service::validate_service_area,
        cart_service::{build_view, load_cart},
        user_service::find_user,
    },
    state::AppState,
};

const DEFAULT_CANCEL_REASON: &str = "고객 요청 취소";

/// Checks shared by checkout and payment confirmation.
fn validate_cart(rows: &[(CartModel, ProductModel)]) -> AppResult<()> {
    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    let now = Utc::now();
    for (item, product) in rows {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if !is_orderable(product, now) {
            return Err(AppError::BadRequest(format!(
                "{} is no longer on sale",
                product.name
            )));
        }
        if product.stock < item.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
    }
    Ok(())
}

async fn priced_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<(UserModel, Vec<(CartModel, ProductModel)>, CartView)> {
    let member = find_user(&state.orm, user.user_id).await?;
    validate_service_area(&member.address, &state.config.service_area)?;
    let rows = load_cart(&state.orm, user.user_id).await?;
    validate_cart(&rows)?;
    let view = build_view(&rows, &member.grade);
    Ok((member, rows, view))
}

pub const MAX_MEMO_LEN: usize = 200;

fn clean_memo(memo: Option<String>) -> Option<String> {
    memo.map(|m| m.trim().chars().take(MAX_MEMO_LEN).collect::<String>())
        .filter(|m| !m.is_empty())
}

pub fn build_order_number(now: chrono::DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

pub fn build_order_name(rows: &[(CartModel, ProductModel)]) -> String {
    match rows {
        [] => String::new(),
        [(_, only)] => only.name.clone(),
        [(_, first), rest @ ..] => format!("{} 외 {}건", first.name, rest.len()),
    }
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<PaymentRequest>> {
    let (member, rows, view) = priced_cart(state, user).await?;
    let request_memo = clean_memo(payload.request_memo);

    let request = PaymentRequest {
        order_id: build_order_number(Utc::now()),
        order_name: build_order_name(&rows),
        amount: view.total_amount,
        items_amount: view.items_amount,
        delivery_fee: view.delivery_fee,
        customer_email: member.email,
        customer_name: member.name,
        request_memo,
    };

    tracing::info!(
        user_id = %user.user_id,
        order_id = %request.order_id,
        amount = request.amount,
        "checkout prepared"
    );

    Ok(ApiResponse::success("Checkout ready", request, Some(Meta::empty())))
}

async fn order_with_items<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // A repeated confirm for the same gateway order returns the stored order.
    if let Some(existing) = Orders::find()
        .filter(OrderCol::OrderNumber.eq(payload.order_id.as_str()))
        .one(&state.orm)
        .await?
    {
        if existing.user_id != user.user_id {
            return Err(AppError::Conflict("order id already used".into()));
        }
        let data = order_with_items(&state.orm, existing).await?;
        return Ok(ApiResponse::success("Payment already confirmed", data, Some(Meta::empty())));
    }

    let (member, rows, view) = priced_cart(state, user).await?;
    if payload.amount != view.total_amount {
        tracing::warn!(
            user_id = %user.user_id,
            expected = view.total_amount,
            received = payload.amount,
            "payment amount mismatch"
        );
        return Err(AppError::BadRequest("Payment amount does not match the cart".into()));
    }

    let payment = state
        .payments
        .confirm(&payload.payment_key, &payload.order_id, payload.amount)
        .await?;
    tracing::info!(
        order_id = %payment.order_id,
        status = %payment.status,
        "payment confirmed by gateway"
    );

    let txn = state.orm.begin().await?;
    let stored = store_order(&txn, &member, &rows, &view, &payload).await;
    let order = match stored {
        Ok(order) => {
            txn.commit().await?;
            order
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "order rollback failed");
            }
            // The card was charged but the order could not be written.
            if let Err(cancel_err) = state
                .payments
                .cancel(&payload.payment_key, "주문 처리 실패")
                .await
            {
                tracing::error!(
                    error = %cancel_err,
                    order_id = %payload.order_id,
                    "failed to void payment after order error"
                );
            }
            return Err(err);
        }
    };

    audit::record(
        state,
        Some(user.user_id),
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.order.id, "amount": order.order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success("Payment confirmed", order, Some(Meta::empty())))
}

async fn store_order(
    txn: &DatabaseTransaction,
    member: &UserModel,
    rows: &[(CartModel, ProductModel)],
    view: &CartView,
    payload: &ConfirmPaymentRequest,
) -> AppResult<OrderWithItems> {
    let now = Utc::now();
    let order_id = Uuid::new_v4();

    // Stock is taken with a guarded update so a concurrent order cannot
    // drive it below zero.
    for (item, product) in rows {
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(item.quantity))
            .filter(
                Condition::all()
                    .add(ProdCol::Id.eq(product.id))
                    .add(ProdCol::Stock.gte(item.quantity)),
            )
            .exec(txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
    }

    let lines: Vec<_> = view
        .groups
        .iter()
        .flat_map(|g| g.items.iter().map(move |i| (g, i)))
        .collect();
    let details = order_details::render(
        lines
            .iter()
            .map(|(g, i)| (g.category.as_str(), i.product.name.as_str(), i.quantity)),
    );

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(payload.order_id.clone()),
        payment_key: Set(payload.payment_key.clone()),
        user_id: Set(member.id),
        product_details: Set(details),
        items_amount: Set(view.items_amount),
        delivery_fee: Set(view.delivery_fee),
        total_amount: Set(view.total_amount),
        status: Set(OrderStatus::Paid.as_str().to_string()),
        delivery_name: Set(member.name.clone()),
        delivery_phone: Set(member.phone.clone()),
        delivery_address: Set(member.address.clone()),
        delivery_address_detail: Set(member.address_detail.clone()),
        entrance_code: Set(member.entrance_code.clone()),
        request_memo: Set(clean_memo(payload.request_memo.clone())),
        paid_at: Set(now.into()),
        cancelled_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (group, line) in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product.id)),
            product_name: Set(line.product.name.clone()),
            category: Set(group.category.clone()),
            price: Set(line.unit_price),
            quantity: Set(line.quantity),
            settlement_id: Set(None),
            created_at: Set(now.into()),
        }
        .insert(txn)
        .await?;
        items.push(OrderItem::from(item));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(member.id))
        .exec(txn)
        .await?;

    Ok(OrderWithItems {
        order: Order::from(order),
        items,
    })
}

pub fn parse_status_filter(status: Option<&String>) -> AppResult<Option<OrderStatus>> {
    status
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()
}

pub async fn paginate_orders(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    let (page, limit, offset) = query.pagination.normalize();
    if let Some(status) = parse_status_filter(query.status.as_ref())? {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder: Select<Orders> = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok((orders, Meta::new(page, limit, total)))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    let (orders, meta) = paginate_orders(state, condition, query).await?;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

async fn find_own_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_own_order(state, user, id).await?;
    let data = order_with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn load_order_with_items(state: &AppState, id: Uuid) -> AppResult<OrderWithItems> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    order_with_items(&state.orm, order).await
}

/// Customers may cancel until the order has been handed to delivery.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_own_order(state, user, id).await?;
    let current: OrderStatus = order.status.parse()?;
    if current != OrderStatus::Paid {
        return Err(AppError::BadRequest(
            "Only orders that are not yet in delivery can be cancelled".into(),
        ));
    }
    let reason = payload
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    let order = change_status(state, user, order, OrderStatus::Cancelled, &reason).await?;
    let data = order_with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("Order cancelled", data, Some(Meta::empty())))
}

/// Move an order through the status machine. Cancelling voids the payment
/// at the gateway and puts the items back in stock.
///
/// The status is written with a guard on the status that was read, so two
/// callers racing on the same order cannot both apply the change. On cancel
/// the gateway is called after the stock and status writes and before the
/// commit; a gateway failure rolls both back.
pub async fn change_status(
    state: &AppState,
    actor: &AuthUser,
    order: OrderModel,
    next: OrderStatus,
    reason: &str,
) -> AppResult<OrderModel> {
    let current: OrderStatus = order.status.parse()?;
    current.transition(next)?;
    let cancelling = next == OrderStatus::Cancelled;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let txn = state.orm.begin().await?;

    let mut update = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(next.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now));
    if cancelling {
        update = update.col_expr(OrderCol::CancelledAt, Expr::value(Some(now)));
    }
    let result = update
        .filter(OrderCol::Id.eq(order.id))
        .filter(OrderCol::Status.eq(current.as_str()))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Order status was changed by another request".into(),
        ));
    }

    if cancelling {
        restock(&txn, &order).await?;
        if let Err(err) = state.payments.cancel(&order.payment_key, reason).await {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "status rollback failed");
            }
            return Err(err);
        }
    }

    if let Err(err) = txn.commit().await {
        if cancelling {
            tracing::error!(
                order_id = %order.id,
                order_number = %order.order_number,
                error = %err,
                "payment cancelled at gateway but order update failed; needs reconciliation"
            );
        }
        return Err(err.into());
    }

    let updated = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        state,
        Some(actor.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({
            "order_id": updated.id,
            "from": current.as_str(),
            "to": next.as_str(),
        }),
    )
    .await;

    Ok(updated)
}

/// Return an order's quantities to stock. Orders without item rows are
/// restocked from their product-details summary, matched by product name.
pub async fn restock(txn: &DatabaseTransaction, order: &OrderModel) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(txn)
        .await?;

    if !items.is_empty() {
        for item in items {
            if let Some(product_id) = item.product_id {
                add_stock(txn, ProdCol::Id.eq(product_id), item.quantity).await?;
            }
        }
        return Ok(());
    }

    for line in order_details::parse(&order.product_details) {
        let mut condition = Condition::all().add(ProdCol::Name.eq(line.name.as_str()));
        if !line.category.is_empty() {
            condition = condition.add(ProdCol::Category.eq(line.category.as_str()));
        }
        let matched = add_stock(txn, condition, line.quantity).await?;
        if matched == 0 {
            tracing::warn!(order_id = %order.id, product = %line.name, "restock skipped: product not found");
        }
    }
    Ok(())
}

async fn add_stock<F>(txn: &DatabaseTransaction, filter: F, quantity: i32) -> AppResult<u64>
where
    F: IntoCondition,
{
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(quantity))
        .filter(filter)
        .exec(txn)
        .await?;
    Ok(result.rows_affected)
}
