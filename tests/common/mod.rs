#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use basket_uncle::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    models::{GRADE_RETAIL, ROLE_ADMIN, ROLE_USER, TAX_FREE},
    state::AppState,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

pub const AREA: &str = "송도동";

/// Calls received by the fake payment gateway.
///
/// Confirms for keys starting with `hold` signal `held` and then wait for
/// `release`, so a test can change the database while the charge is in flight.
#[derive(Clone, Default)]
pub struct GatewayLog {
    calls: Arc<Mutex<Vec<String>>>,
    pub held: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatewayLog {
    fn push(&self, entry: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(entry);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("cancel:"))
            .collect()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: GatewayLog,
    // Held so the upload directory lives as long as the test.
    pub uploads: TempDir,
}

async fn fake_confirm(State(log): State<GatewayLog>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let key = body["paymentKey"].as_str().unwrap_or_default().to_string();
    log.push(format!("confirm:{key}"));
    if key.starts_with("hold") {
        log.held.notify_one();
        log.release.notified().await;
    }
    if key.starts_with("reject") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "REJECT_CARD_PAYMENT", "message": "한도초과 혹은 잔액부족" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "paymentKey": key,
            "orderId": body["orderId"],
            "status": "DONE",
            "totalAmount": body["amount"],
            "method": "카드",
        })),
    )
}

async fn fake_cancel(
    State(log): State<GatewayLog>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let reason = body["cancelReason"].as_str().unwrap_or_default();
    log.push(format!("cancel:{key}:{reason}"));
    if key.starts_with("stuck") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "NOT_CANCELABLE_PAYMENT", "message": "취소할 수 없는 결제입니다." })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "paymentKey": key, "orderId": "unused", "status": "CANCELED" })),
    )
}

async fn spawn_gateway(log: GatewayLog) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/v1/payments/confirm", post(fake_confirm))
        .route("/v1/payments/{key}/cancel", post(fake_cancel))
        .with_state(log);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let gateway = GatewayLog::default();
    let base = spawn_gateway(gateway.clone()).await?;
    let uploads = tempfile::tempdir()?;

    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        toss_secret_key: "test_sk_dummy".into(),
        toss_api_base: base,
        upload_dir: uploads.path().to_string_lossy().into_owned(),
        service_area: AREA.into(),
    };
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    Ok(TestApp {
        state: AppState::new(orm, config),
        gateway,
        uploads,
    })
}

pub async fn create_user(
    state: &AppState,
    email: &str,
    role: &str,
    grade: &str,
) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.into()),
        password_hash: Set("unused".into()),
        name: Set("홍길동".into()),
        phone: Set("010-1234-5678".into()),
        address: Set(format!("인천 연수구 {AREA} 27-1")),
        address_detail: Set("101동 1001호".into()),
        entrance_code: Set("#1234".into()),
        grade: Set(grade.into()),
        role: Set(role.into()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn customer(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    create_user(state, email, ROLE_USER, GRADE_RETAIL).await
}

pub async fn admin(state: &AppState) -> anyhow::Result<AuthUser> {
    create_user(state, "admin@example.com", ROLE_ADMIN, GRADE_RETAIL).await
}

pub async fn create_category(
    state: &AppState,
    name: &str,
    manager_email: Option<&str>,
) -> anyhow::Result<()> {
    CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        parent_id: Set(None),
        manager_email: Set(manager_email.map(str::to_string)),
        tax_type: Set(TAX_FREE.into()),
        sort_order: Set(0),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    category: &str,
    price_retail: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        description: Set(None),
        price_retail: Set(price_retail),
        price_wholesale: Set(None),
        category: Set(category.into()),
        sub_category: Set(None),
        stock: Set(stock),
        deadline: Set(None),
        image_url: Set(None),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}
