use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use basket_uncle::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CatCol, Entity as Categories},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    models::{GRADE_RETAIL, ROLE_ADMIN, ROLE_USER, TAX_FREE, TAX_TAXABLE},
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_email =
        std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into());
    let admin_password =
        std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin1234".into());
    let area = config.service_area.clone();

    let admin_id = ensure_user(&orm, &admin_email, &admin_password, ROLE_ADMIN, &area).await?;
    let user_id = ensure_user(&orm, "user@example.com", "user1234", ROLE_USER, &area).await?;
    seed_categories(&orm).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    email: &str,
    password: &str,
    role: &str,
    area: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already exists");
        return Ok(existing.id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        name: Set(if role == ROLE_ADMIN { "관리자" } else { "송도주민" }.to_string()),
        phone: Set("010-0000-0000".into()),
        address: Set(format!("인천 연수구 {area} 1-1")),
        address_detail: Set("101동 101호".into()),
        entrance_code: Set(String::new()),
        grade: Set(GRADE_RETAIL.into()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Created user {email} (role={role})");
    Ok(user.id)
}

async fn seed_categories(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let categories = [
        ("채소", TAX_FREE, 1),
        ("과일", TAX_FREE, 2),
        ("정육", TAX_FREE, 3),
        ("생활용품", TAX_TAXABLE, 4),
    ];

    for (name, tax_type, sort_order) in categories {
        let exists = Categories::find()
            .filter(CatCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        CategoryActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.into()),
            parent_id: Set(None),
            manager_email: Set(None),
            tax_type: Set(tax_type.into()),
            sort_order: Set(sort_order),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded categories");
    Ok(())
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = [
        ("흙당근 1kg", "채소", "국내산", 4500, None, 40),
        ("양파 3kg", "채소", "국내산", 7900, Some(6900), 30),
        ("제주 감귤 2kg", "과일", "제주산", 15900, Some(13900), 25),
        ("한돈 삼겹살 500g", "정육", "냉장", 16900, None, 20),
        ("주방세제 1L", "생활용품", "리필용", 5500, None, 50),
    ];
    let deadline = Utc::now() + Duration::days(14);

    for (name, category, description, price_retail, price_wholesale, stock) in products {
        let exists = Products::find()
            .filter(ProdCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some();
        if exists {
            continue;
        }
        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.into()),
            description: Set(Some(description.into())),
            price_retail: Set(price_retail),
            price_wholesale: Set(price_wholesale),
            category: Set(category.into()),
            sub_category: Set(None),
            stock: Set(stock),
            deadline: Set(Some(deadline.into())),
            image_url: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
