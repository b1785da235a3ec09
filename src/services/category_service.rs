use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use crate::{
    audit,
    dto::categories::{CategoryNode, CategoryTree, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CatCol, Entity as Categories, Model as CategoryModel},
        order_items::{Column as ItemCol, Entity as OrderItems},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, TAX_FREE, TAX_TAXABLE},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn validate_tax_type(tax_type: &str) -> AppResult<()> {
    if tax_type == TAX_TAXABLE || tax_type == TAX_FREE {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Invalid tax type: {tax_type}")))
    }
}

/// Group categories into top-level nodes with their children, each level
/// ordered by `sort_order` then name.
pub fn build_tree(mut categories: Vec<CategoryModel>) -> Vec<CategoryNode> {
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    let (roots, children): (Vec<_>, Vec<_>) =
        categories.into_iter().partition(|c| c.parent_id.is_none());

    roots
        .into_iter()
        .map(|root| {
            let kids = children
                .iter()
                .filter(|c| c.parent_id == Some(root.id))
                .cloned()
                .map(Category::from)
                .collect();
            CategoryNode {
                category: Category::from(root),
                children: kids,
            }
        })
        .collect()
}

pub async fn list_tree(state: &AppState) -> AppResult<ApiResponse<CategoryTree>> {
    let all = Categories::find().all(&state.orm).await?;
    let items = build_tree(all);
    Ok(ApiResponse::success("Categories", CategoryTree { items }, Some(Meta::empty())))
}

pub async fn find_by_name<C: sea_orm::ConnectionTrait>(
    conn: &C,
    name: &str,
) -> AppResult<Option<CategoryModel>> {
    Ok(Categories::find()
        .filter(CatCol::Name.eq(name))
        .one(conn)
        .await?)
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    let tax_type = payload.tax_type.unwrap_or_else(|| TAX_TAXABLE.to_string());
    validate_tax_type(&tax_type)?;

    if find_by_name(&state.orm, &name).await?.is_some() {
        return Err(AppError::Conflict(format!("category {name} already exists")));
    }

    if let Some(parent_id) = payload.parent_id {
        let parent = Categories::find_by_id(parent_id)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::BadRequest("parent category not found".into()))?;
        if parent.parent_id.is_some() {
            return Err(AppError::BadRequest(
                "sub-categories cannot have children".into(),
            ));
        }
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        parent_id: Set(payload.parent_id),
        manager_email: Set(payload.manager_email.filter(|e| !e.trim().is_empty())),
        tax_type: Set(tax_type),
        sort_order: Set(payload.sort_order.unwrap_or(0)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        state,
        Some(user.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id, "name": category.name }),
    )
    .await;

    Ok(ApiResponse::success("Category created", Category::from(category), Some(Meta::empty())))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = Categories::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let old_name = existing.name.clone();
    let is_sub = existing.parent_id.is_some();

    let mut active: CategoryActive = existing.into();
    let mut renamed_to = None;
    if let Some(name) = payload.name.map(|n| n.trim().to_string()) {
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }
        if name != old_name {
            if find_by_name(&txn, &name).await?.is_some() {
                return Err(AppError::Conflict(format!("category {name} already exists")));
            }
            active.name = Set(name.clone());
            renamed_to = Some(name);
        }
    }
    if let Some(email) = payload.manager_email {
        let email = email.trim().to_string();
        active.manager_email = Set((!email.is_empty()).then_some(email));
    }
    if let Some(tax_type) = payload.tax_type {
        validate_tax_type(&tax_type)?;
        active.tax_type = Set(tax_type);
    }
    if let Some(sort_order) = payload.sort_order {
        active.sort_order = Set(sort_order);
    }
    let updated = active.update(&txn).await?;

    // Products carry the category name, so a rename has to follow through.
    if let Some(new_name) = &renamed_to {
        let column = if is_sub { ProdCol::SubCategory } else { ProdCol::Category };
        Products::update_many()
            .col_expr(column, Expr::value(new_name.clone()))
            .filter(column.eq(old_name.as_str()))
            .exec(&txn)
            .await?;

        // Unsettled lines are settled under the category name, so they move
        // with it. Settled lines keep the name they were paid out under.
        if !is_sub {
            OrderItems::update_many()
                .col_expr(ItemCol::Category, Expr::value(new_name.clone()))
                .filter(ItemCol::Category.eq(old_name.as_str()))
                .filter(ItemCol::SettlementId.is_null())
                .exec(&txn)
                .await?;
        }
    }

    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": id, "renamed_from": renamed_to.map(|_| old_name) }),
    )
    .await;

    Ok(ApiResponse::success("Category updated", Category::from(updated), Some(Meta::empty())))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let children = Categories::find()
        .filter(CatCol::ParentId.eq(id))
        .count(&state.orm)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict("category still has sub-categories".into()));
    }

    let products = Products::find()
        .filter(
            Condition::any()
                .add(ProdCol::Category.eq(existing.name.as_str()))
                .add(ProdCol::SubCategory.eq(existing.name.as_str())),
        )
        .count(&state.orm)
        .await?;
    if products > 0 {
        return Err(AppError::Conflict("category still has products".into()));
    }

    Categories::delete_by_id(id).exec(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id, "name": existing.name }),
    )
    .await;

    Ok(ApiResponse::success("Deleted", serde_json::json!({}), Some(Meta::empty())))
}

pub async fn list_flat(state: &AppState) -> AppResult<Vec<CategoryModel>> {
    Ok(Categories::find()
        .order_by_asc(CatCol::SortOrder)
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cat(name: &str, parent: Option<Uuid>, sort: i32) -> CategoryModel {
        CategoryModel {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: parent,
            manager_email: None,
            tax_type: TAX_TAXABLE.into(),
            sort_order: sort,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let veg = cat("채소", None, 1);
        let fruit = cat("과일", None, 0);
        let root_veg = cat("뿌리채소", Some(veg.id), 0);
        let leaf_veg = cat("잎채소", Some(veg.id), 0);
        let tree = build_tree(vec![leaf_veg, veg, root_veg, fruit]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.name, "과일");
        assert!(tree[0].children.is_empty());
        assert_eq!(tree[1].category.name, "채소");
        let names: Vec<_> = tree[1].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["뿌리채소", "잎채소"]);
    }
}
