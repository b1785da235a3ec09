use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    delivery,
    dto::cart::{AddToCartRequest, CartGroup, CartItemDto, CartView, UpdateCartRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product, is_orderable, unit_price},
    response::{ApiResponse, Meta},
    services::user_service::find_user,
    state::AppState,
};

/// Cart rows joined with their products, oldest first.
pub async fn load_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<(CartModel, ProductModel)>> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| (item, p)))
        .collect())
}

/// Group cart lines by product category and price them for a member grade.
pub fn build_view(rows: &[(CartModel, ProductModel)], grade: &str) -> CartView {
    let mut groups: Vec<CartGroup> = Vec::new();
    for (item, product) in rows {
        let price = unit_price(product, grade);
        let line_total = price * i64::from(item.quantity);
        let dto = CartItemDto {
            id: item.id,
            product: Product::from(product.clone()),
            quantity: item.quantity,
            unit_price: price,
            line_total,
        };
        match groups.iter_mut().find(|g| g.category == product.category) {
            Some(group) => group.items.push(dto),
            None => groups.push(CartGroup {
                category: product.category.clone(),
                items: vec![dto],
                subtotal: 0,
                delivery_fee: 0,
            }),
        }
    }

    let quote = delivery::quote(
        groups
            .iter()
            .flat_map(|g| g.items.iter().map(move |i| (g.category.as_str(), i.line_total))),
    );
    for group in &mut groups {
        if let Some(fee) = quote.per_category.iter().find(|c| c.category == group.category) {
            group.subtotal = fee.subtotal;
            group.delivery_fee = fee.fee;
        }
    }

    CartView {
        groups,
        items_amount: quote.items_amount,
        delivery_fee: quote.delivery_fee,
        total_amount: quote.total(),
    }
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let member = find_user(&state.orm, user.user_id).await?;
    let rows = load_cart(&state.orm, user.user_id).await?;
    let view = build_view(&rows, &member.grade);
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

/// Upper bound on the quantity of one product in a cart.
pub const MAX_CART_QUANTITY: i32 = 999;

fn validate_quantity(quantity: i32) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    if quantity > MAX_CART_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "quantity cannot exceed {MAX_CART_QUANTITY}"
        )));
    }
    Ok(quantity)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let quantity = validate_quantity(payload.quantity.unwrap_or(1))?;

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !is_orderable(&product, Utc::now()) {
        return Err(AppError::BadRequest(format!(
            "{} is no longer on sale",
            product.name
        )));
    }

    let exist = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    let cart_item = match exist {
        Some(item) => {
            let new_quantity = item
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| AppError::BadRequest("quantity is too large".into()))
                .and_then(validate_quantity)?;
            let mut active: CartActive = item.into();
            active.quantity = Set(new_quantity);
            active.update(&state.orm).await?
        }
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                quantity: Set(quantity),
                created_at: Set(Utc::now().into()),
            }
            .insert(&state.orm)
            .await?
        }
    };

    audit::record(
        state,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": cart_item.quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", CartItem::from(cart_item), None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let quantity = validate_quantity(payload.quantity)?;

    let item = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user.user_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CartActive = item.into();
    active.quantity = Set(quantity);
    let updated = active.update(&state.orm).await?;

    Ok(ApiResponse::success("OK", CartItem::from(updated), None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::ProductId.eq(product_id))
                .add(CartCol::UserId.eq(user.user_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        state,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GRADE_RETAIL, GRADE_WHOLESALE};

    fn product(name: &str, category: &str, retail: i64, wholesale: Option<i64>) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price_retail: retail,
            price_wholesale: wholesale,
            category: category.into(),
            sub_category: None,
            stock: 100,
            deadline: None,
            image_url: None,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    fn line(product: &ProductModel, quantity: i32) -> (CartModel, ProductModel) {
        (
            CartModel {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                product_id: product.id,
                quantity,
                created_at: Utc::now().into(),
            },
            product.clone(),
        )
    }

    #[test]
    fn groups_by_category_with_fees() {
        let potato = product("감자", "채소", 30_000, Some(25_000));
        let onion = product("양파", "채소", 10_000, None);
        let apple = product("사과", "과일", 8_000, None);
        let rows = vec![line(&potato, 2), line(&apple, 1), line(&onion, 1)];

        let view = build_view(&rows, GRADE_RETAIL);
        assert_eq!(view.groups.len(), 2);
        assert_eq!(view.groups[0].category, "채소");
        assert_eq!(view.groups[0].items.len(), 2);
        assert_eq!(view.groups[0].subtotal, 70_000);
        assert_eq!(view.groups[0].delivery_fee, 3800);
        assert_eq!(view.groups[1].delivery_fee, 1900);
        assert_eq!(view.items_amount, 78_000);
        assert_eq!(view.delivery_fee, 5700);
        assert_eq!(view.total_amount, 83_700);
    }

    #[test]
    fn wholesale_members_pay_wholesale_price() {
        let potato = product("감자", "채소", 30_000, Some(25_000));
        let onion = product("양파", "채소", 10_000, None);
        let view = build_view(&[line(&potato, 2), line(&onion, 1)], GRADE_WHOLESALE);
        assert_eq!(view.groups[0].items[0].unit_price, 25_000);
        assert_eq!(view.groups[0].items[1].unit_price, 10_000);
        assert_eq!(view.items_amount, 60_000);
        assert_eq!(view.delivery_fee, 3800);
    }

    #[test]
    fn quantity_must_be_positive_and_bounded() {
        assert_eq!(validate_quantity(1).unwrap(), 1);
        assert_eq!(validate_quantity(MAX_CART_QUANTITY).unwrap(), MAX_CART_QUANTITY);
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_CART_QUANTITY + 1).is_err());
        assert!(validate_quantity(i32::MAX).is_err());
    }
}
