use sea_orm::{
    ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::{ChangePasswordRequest, UpdateProfileRequest, UpdateUserRequest, UserList},
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{GRADE_RETAIL, GRADE_WHOLESALE, ROLE_ADMIN, ROLE_USER, User},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::auth_service::{MIN_PASSWORD_LEN, hash_password, validate_service_area, verify_password},
    state::AppState,
};

pub async fn find_user<C: sea_orm::ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn get_me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", User::from(model), Some(Meta::empty())))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = find_user(&state.orm, user.user_id).await?;

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name.map(|n| n.trim().to_string()) {
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".into()));
        }
        active.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone.trim().to_string());
    }
    if let Some(address) = payload.address {
        validate_service_area(&address, &state.config.service_area)?;
        active.address = Set(address.trim().to_string());
    }
    if let Some(detail) = payload.address_detail {
        active.address_detail = Set(detail.trim().to_string());
    }
    if let Some(code) = payload.entrance_code {
        active.entrance_code = Set(code.trim().to_string());
    }
    let updated = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success("Profile updated", User::from(updated), Some(Meta::empty())))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = find_user(&state.orm, user.user_id).await?;
    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::BadRequest("Current password does not match".into()));
    }
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success("Password changed", serde_json::json!({}), Some(Meta::empty())))
}

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success("Users", UserList { items }, Some(Meta::new(page, limit, total))))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let existing = find_user(&state.orm, id).await?;

    let mut active: UserActive = existing.into();
    if let Some(grade) = payload.grade {
        if grade != GRADE_RETAIL && grade != GRADE_WHOLESALE {
            return Err(AppError::BadRequest("Invalid grade".into()));
        }
        active.grade = Set(grade);
    }
    if let Some(role) = payload.role {
        if role != ROLE_USER && role != ROLE_ADMIN {
            return Err(AppError::BadRequest("Invalid role".into()));
        }
        active.role = Set(role);
    }
    let updated = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        "user_update",
        "users",
        serde_json::json!({ "user_id": id, "grade": updated.grade, "role": updated.role }),
    )
    .await;

    Ok(ApiResponse::success("User updated", User::from(updated), Some(Meta::empty())))
}
