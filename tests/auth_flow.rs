mod common;

use axum::Router;
use basket_uncle::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        users::{ChangePasswordRequest, UpdateProfileRequest},
    },
    error::AppError,
    middleware::auth::decode_token,
    routes::create_api_router,
    services::{auth_service, user_service},
};
use serde_json::{Value, json};

use common::{create_category, create_product, setup};

fn register_request(email: &str, address: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "pass1234".into(),
        name: "김송도".into(),
        phone: "010-2222-3333".into(),
        address: address.into(),
        address_detail: "202동 303호".into(),
        entrance_code: "*5678".into(),
    }
}

#[tokio::test]
async fn registration_is_limited_to_the_service_area() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;

    let err = auth_service::register_user(state, register_request("far@example.com", "서울 강남구 역삼동 1"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let user = auth_service::register_user(
        state,
        register_request("Near@Example.com", "인천 연수구 송도동 10"),
    )
    .await?
    .data
    .expect("user");
    assert_eq!(user.email, "near@example.com");
    assert_eq!(user.grade, "RETAIL");
    assert_eq!(user.role, "user");

    let err = auth_service::register_user(
        state,
        register_request("near@example.com", "인천 연수구 송도동 10"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn login_token_identifies_the_member() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;

    let user = auth_service::register_user(
        state,
        register_request("member@example.com", "인천 연수구 송도동 10"),
    )
    .await?
    .data
    .expect("user");

    let err = auth_service::login_user(
        state,
        LoginRequest {
            email: "member@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let login = auth_service::login_user(
        state,
        LoginRequest {
            email: "member@example.com".into(),
            password: "pass1234".into(),
        },
    )
    .await?
    .data
    .expect("token");
    let token = login.token.strip_prefix("Bearer ").expect("bearer prefix");
    let auth = decode_token(token, &state.config.jwt_secret)?;
    assert_eq!(auth.user_id, user.id);
    assert!(!auth.is_admin());

    // Moving out of the delivery area is refused.
    let err = user_service::update_profile(
        state,
        &auth,
        UpdateProfileRequest {
            name: None,
            phone: None,
            address: Some("부산 해운대구 우동 1".into()),
            address_detail: None,
            entrance_code: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    user_service::change_password(
        state,
        &auth,
        ChangePasswordRequest {
            current_password: "pass1234".into(),
            new_password: "newpass99".into(),
        },
    )
    .await?;
    auth_service::login_user(
        state,
        LoginRequest {
            email: "member@example.com".into(),
            password: "newpass99".into(),
        },
    )
    .await?;

    Ok(())
}

#[tokio::test]
async fn http_api_round_trip() -> anyhow::Result<()> {
    let app = setup().await?;
    create_category(&app.state, "채소", None).await?;
    let potato = create_product(&app.state, "감자", "채소", 12_000, 10).await?;

    let router = Router::new()
        .nest("/api", create_api_router())
        .with_state(app.state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}/api", listener.local_addr()?);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/auth/register"))
        .json(&json!({
            "email": "web@example.com",
            "password": "pass1234",
            "name": "웹회원",
            "phone": "010-1111-2222",
            "address": "인천 연수구 송도동 5"
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), 201);

    let login: Value = client
        .post(format!("{base}/auth/login"))
        .json(&json!({ "email": "web@example.com", "password": "pass1234" }))
        .send()
        .await?
        .json()
        .await?;
    let token = login["data"]["token"].as_str().expect("token").to_string();

    let resp = client.get(format!("{base}/cart")).send().await?;
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{base}/cart"))
        .header("Authorization", &token)
        .json(&json!({ "product_id": potato, "quantity": 2 }))
        .send()
        .await?;
    assert_eq!(resp.status(), 201);

    let cart: Value = client
        .get(format!("{base}/cart"))
        .header("Authorization", &token)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(cart["data"]["items_amount"], 24_000);
    assert_eq!(cart["data"]["delivery_fee"], 1_900);
    assert_eq!(cart["data"]["groups"][0]["category"], "채소");

    let resp = client
        .get(format!("{base}/admin/orders"))
        .header("Authorization", &token)
        .send()
        .await?;
    assert_eq!(resp.status(), 403);

    let products: Value = client
        .get(format!("{base}/products?cat=채소"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(products["data"].as_array().map(Vec::len), Some(1));

    let tree: Value = client
        .get(format!("{base}/categories"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(tree["data"][0]["name"], "채소");

    Ok(())
}
