use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductImportResult, ProductList, UpdateProductRequest},
    entity::{
        categories::Model as CategoryModel,
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    excel::{self, ImportIssue},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::category_service,
    state::AppState,
    uploads::{self, UploadedFile},
};

fn filtered(query: &ProductQuery, active_only: bool) -> Select<Products> {
    let mut condition = Condition::all();
    if active_only {
        condition = condition.add(Column::IsActive.eq(true));
    }

    if let Some(search) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(Column::Name.contains(search))
                .add(Column::Description.contains(search)),
        );
    }
    if let Some(cat) = query.cat.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::Category.eq(cat.as_str()));
    }
    if let Some(sub) = query.sub.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Column::SubCategory.eq(sub.as_str()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::PriceRetail.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::PriceRetail.lte(max_price));
    }

    let sort_col = match query.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::PriceRetail,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Deadline => Column::Deadline,
    };

    let finder = Products::find().filter(condition);
    match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    }
}

async fn paged(
    state: &AppState,
    finder: Select<Products>,
    query: &ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Storefront listing: active products only.
pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    paged(state, filtered(&query, true), &query).await
}

/// Admin listing including hidden products.
pub async fn list_all_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    paged(state, filtered(&query, false), &query).await
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active)
        .map(Product::from);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

/// The category must be a top-level category and the sub-category, when
/// given, one of its children.
fn check_placement(
    categories: &[CategoryModel],
    category: &str,
    sub_category: Option<&str>,
) -> Result<(), String> {
    let parent = categories
        .iter()
        .find(|c| c.name == category && c.parent_id.is_none())
        .ok_or_else(|| format!("unknown category: {category}"))?;
    if let Some(sub) = sub_category {
        let ok = categories
            .iter()
            .any(|c| c.name == sub && c.parent_id == Some(parent.id));
        if !ok {
            return Err(format!("{sub} is not a sub-category of {category}"));
        }
    }
    Ok(())
}

fn check_prices(retail: i64, wholesale: Option<i64>, stock: i32) -> AppResult<()> {
    if retail < 0 || wholesale.is_some_and(|w| w < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if stock < 0 {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    check_prices(payload.price_retail, payload.price_wholesale, payload.stock)?;
    let sub_category = payload.sub_category.filter(|s| !s.trim().is_empty());
    let categories = category_service::list_flat(state).await?;
    check_placement(&categories, &payload.category, sub_category.as_deref())
        .map_err(AppError::BadRequest)?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(payload.description),
        price_retail: Set(payload.price_retail),
        price_wholesale: Set(payload.price_wholesale),
        category: Set(payload.category),
        sub_category: Set(sub_category),
        stock: Set(payload.stock),
        deadline: Set(payload.deadline.map(Into::into)),
        image_url: Set(payload.image_url),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    check_prices(
        payload.price_retail.unwrap_or(existing.price_retail),
        payload.price_wholesale.or(existing.price_wholesale),
        payload.stock.unwrap_or(existing.stock),
    )?;

    if payload.category.is_some() || payload.sub_category.is_some() {
        let category = payload.category.clone().unwrap_or_else(|| existing.category.clone());
        let sub_category = match &payload.sub_category {
            Some(sub) if sub.trim().is_empty() => None,
            Some(sub) => Some(sub.clone()),
            None => existing.sub_category.clone(),
        };
        let categories = category_service::list_flat(state).await?;
        check_placement(&categories, &category, sub_category.as_deref())
            .map_err(AppError::BadRequest)?;
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price_retail {
        active.price_retail = Set(price);
    }
    if let Some(price) = payload.price_wholesale {
        active.price_wholesale = Set(Some(price));
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(sub) = payload.sub_category {
        active.sub_category = Set(Some(sub).filter(|s| !s.trim().is_empty()));
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(deadline) = payload.deadline {
        active.deadline = Set(Some(deadline.into()));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let product = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        state,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    file: UploadedFile,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let url = uploads::store_image(&state.config.upload_dir, "products", &file).await?;
    let mut active: ActiveModel = existing.into();
    active.image_url = Set(Some(url));
    let product = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "product_image",
        "products",
        serde_json::json!({ "product_id": id, "image_url": product.image_url }),
    )
    .await;

    Ok(ApiResponse::success("Image uploaded", Product::from(product), Some(Meta::empty())))
}

pub async fn import_products(
    state: &AppState,
    user: &AuthUser,
    bytes: &[u8],
) -> AppResult<ApiResponse<ProductImportResult>> {
    ensure_admin(user)?;
    let (rows, mut skipped) = excel::parse_product_sheet(bytes)?;
    let categories = category_service::list_flat(state).await?;

    let now = Utc::now();
    let mut models = Vec::new();
    for row in rows {
        if let Err(reason) = check_placement(&categories, &row.category, row.sub_category.as_deref())
        {
            skipped.push(ImportIssue {
                row: row.row,
                reason: format!("{}: {reason}", row.name),
            });
            continue;
        }
        models.push(ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(row.name),
            description: Set(row.description),
            price_retail: Set(row.price_retail),
            price_wholesale: Set(row.price_wholesale),
            category: Set(row.category),
            sub_category: Set(row.sub_category),
            stock: Set(row.stock),
            deadline: Set(None),
            image_url: Set(row.image_url),
            is_active: Set(true),
            created_at: Set(now.into()),
        });
    }

    let created = models.len();
    if created > 0 {
        Products::insert_many(models)
            .exec_without_returning(&state.orm)
            .await?;
    }
    skipped.sort_by_key(|issue| issue.row);

    tracing::info!(created, skipped = skipped.len(), "product import finished");
    audit::record(
        state,
        Some(user.user_id),
        "product_import",
        "products",
        serde_json::json!({ "created": created, "skipped": skipped.len() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Import finished",
        ProductImportResult { created, skipped },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TAX_TAXABLE;

    fn cat(name: &str, parent: Option<Uuid>) -> CategoryModel {
        CategoryModel {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: parent,
            manager_email: None,
            tax_type: TAX_TAXABLE.into(),
            sort_order: 0,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn placement_requires_matching_parent() {
        let veg = cat("채소", None);
        let fruit = cat("과일", None);
        let leafy = cat("잎채소", Some(veg.id));
        let all = vec![veg, fruit, leafy];

        assert!(check_placement(&all, "채소", None).is_ok());
        assert!(check_placement(&all, "채소", Some("잎채소")).is_ok());
        assert!(check_placement(&all, "과일", Some("잎채소")).is_err());
        assert!(check_placement(&all, "잎채소", None).is_err());
        assert!(check_placement(&all, "고기", None).is_err());
    }
}
