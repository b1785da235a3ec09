mod common;

use basket_uncle::{
    dto::categories::CreateCategoryRequest,
    entity::products::{Column as ProdCol, Entity as Products},
    error::AppError,
    services::{category_service, product_service},
    uploads::UploadedFile,
};
use rust_xlsxwriter::Workbook;
use sea_orm::{EntityTrait, QueryOrder};

use common::{admin, create_category, create_product, customer, setup};

fn product_sheet() -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in ["상품명", "카테고리", "세부카테고리", "판매가", "재고"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16, *title)?;
    }
    let rows = [
        ("시금치", "채소", "잎채소", 3_000.0, 12.0),
        ("대파", "채소", "", 2_500.0, 30.0),
        ("한우 등심", "정육", "", 45_000.0, 4.0),
        ("깻잎", "채소", "뿌리채소", 1_500.0, 10.0),
    ];
    for (idx, (name, category, sub, price, stock)) in rows.iter().enumerate() {
        let r = idx as u32 + 1;
        sheet.write_string(r, 0, *name)?;
        sheet.write_string(r, 1, *category)?;
        if !sub.is_empty() {
            sheet.write_string(r, 2, *sub)?;
        }
        sheet.write_number(r, 3, *price)?;
        sheet.write_number(r, 4, *stock)?;
    }
    Ok(workbook.save_to_buffer()?)
}

#[tokio::test]
async fn import_inserts_known_categories_and_reports_the_rest() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let admin = admin(state).await?;

    let veg = category_service::create_category(
        state,
        &admin,
        CreateCategoryRequest {
            name: "채소".into(),
            parent_id: None,
            manager_email: None,
            tax_type: None,
            sort_order: None,
        },
    )
    .await?
    .data
    .expect("category");
    category_service::create_category(
        state,
        &admin,
        CreateCategoryRequest {
            name: "잎채소".into(),
            parent_id: Some(veg.id),
            manager_email: None,
            tax_type: None,
            sort_order: None,
        },
    )
    .await?;

    let result = product_service::import_products(state, &admin, &product_sheet()?)
        .await?
        .data
        .expect("import result");
    assert_eq!(result.created, 2);
    let skipped_rows: Vec<_> = result.skipped.iter().map(|issue| issue.row).collect();
    assert_eq!(skipped_rows, [4, 5]);
    assert!(result.skipped[0].reason.starts_with("한우 등심"));

    let stored = Products::find()
        .order_by_asc(ProdCol::Name)
        .all(&state.orm)
        .await?;
    let names: Vec<_> = stored.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["대파", "시금치"]);
    assert_eq!(stored[1].sub_category.as_deref(), Some("잎채소"));
    assert_eq!(stored[1].stock, 12);

    // Members cannot import.
    let member = customer(state, "buyer@example.com").await?;
    let err = product_service::import_products(state, &member, &product_sheet()?)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn category_delete_is_guarded() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let admin = admin(state).await?;

    let fruit = category_service::create_category(
        state,
        &admin,
        CreateCategoryRequest {
            name: "과일".into(),
            parent_id: None,
            manager_email: None,
            tax_type: None,
            sort_order: None,
        },
    )
    .await?
    .data
    .expect("category");
    let citrus = category_service::create_category(
        state,
        &admin,
        CreateCategoryRequest {
            name: "감귤류".into(),
            parent_id: Some(fruit.id),
            manager_email: None,
            tax_type: None,
            sort_order: None,
        },
    )
    .await?
    .data
    .expect("category");

    let err = category_service::delete_category(state, &admin, fruit.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    category_service::delete_category(state, &admin, citrus.id).await?;

    let apple = create_product(state, "사과", "과일", 25_000, 10).await?;
    let err = category_service::delete_category(state, &admin, fruit.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    product_service::delete_product(state, &admin, apple).await?;
    category_service::delete_category(state, &admin, fruit.id).await?;
    let tree = category_service::list_tree(state).await?.data.expect("tree");
    assert!(tree.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn product_image_is_stored_as_jpeg() -> anyhow::Result<()> {
    let app = setup().await?;
    let state = &app.state;
    let admin = admin(state).await?;
    create_category(state, "채소", None).await?;
    let potato = create_product(state, "감자", "채소", 30_000, 5).await?;

    let img = image::RgbImage::from_pixel(1600, 800, image::Rgb([180, 140, 90]));
    let mut data = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut data), image::ImageFormat::Png)?;

    let product = product_service::upload_image(
        state,
        &admin,
        potato,
        UploadedFile {
            filename: "potato.png".into(),
            data,
        },
    )
    .await?
    .data
    .expect("product");

    let url = product.image_url.expect("image url");
    let relative = url
        .strip_prefix("/uploads/products/")
        .expect("served under /uploads/products");
    assert!(relative.ends_with(".jpg"));

    let stored = std::fs::read(app.uploads.path().join("products").join(relative))?;
    let decoded = image::load_from_memory(&stored)?;
    assert_eq!((decoded.width(), decoded.height()), (1000, 500));

    let err = product_service::upload_image(
        state,
        &admin,
        potato,
        UploadedFile {
            filename: "notes.txt".into(),
            data: b"not an image".to_vec(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}
