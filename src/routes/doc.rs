use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{InventoryAdjustRequest, LowStockQuery, OrderExportQuery, UpdateOrderStatusRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartGroup, CartItemDto, CartView, UpdateCartRequest},
        categories::{CategoryNode, CategoryTree, CreateCategoryRequest, UpdateCategoryRequest},
        orders::{
            CancelOrderRequest, CheckoutRequest, ConfirmPaymentRequest, OrderList, OrderWithItems,
            PaymentRequest,
        },
        products::{
            CreateProductRequest, FileUpload, ProductImportResult, ProductList,
            UpdateProductRequest,
        },
        reviews::{ReviewForm, ReviewList},
        settlements::{PendingSettlement, PendingSettlementList, SettleRequest, SettlementList},
        users::{ChangePasswordRequest, UpdateProfileRequest, UpdateUserRequest, UserList},
    },
    excel::ImportIssue,
    models::{CartItem, Category, Order, OrderItem, Product, Review, Settlement, User},
    order_status::OrderStatus,
    response::{ApiResponse, Meta},
    routes::{admin, auth, cart, categories, health, orders, params, products, reviews, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "바구니 삼촌 API", description = "Storefront, cart, payment and back-office API"),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        users::get_me,
        users::update_me,
        users::change_password,
        categories::list_categories,
        products::list_products,
        products::get_product,
        cart::view_cart,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        orders::list_orders,
        orders::checkout,
        orders::confirm_payment,
        orders::get_order,
        orders::cancel_order,
        orders::create_review,
        reviews::list_reviews,
        admin::list_all_orders,
        admin::export_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_products,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::upload_product_image,
        admin::import_products,
        admin::create_category,
        admin::update_category,
        admin::delete_category,
        admin::list_users,
        admin::update_user,
        admin::list_pending_settlements,
        admin::settle_category,
        admin::list_settlements
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Review,
            Settlement,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            UpdateUserRequest,
            UserList,
            CategoryNode,
            CategoryTree,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            ProductImportResult,
            ImportIssue,
            FileUpload,
            AddToCartRequest,
            UpdateCartRequest,
            CartItemDto,
            CartGroup,
            CartView,
            CheckoutRequest,
            PaymentRequest,
            ConfirmPaymentRequest,
            CancelOrderRequest,
            OrderList,
            OrderWithItems,
            ReviewForm,
            ReviewList,
            PendingSettlement,
            PendingSettlementList,
            SettleRequest,
            SettlementList,
            UpdateOrderStatusRequest,
            InventoryAdjustRequest,
            LowStockQuery,
            OrderExportQuery,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<PaymentRequest>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "Member profile"),
        (name = "Categories", description = "Category tree"),
        (name = "Products", description = "Product catalogue"),
        (name = "Cart", description = "Shopping cart"),
        (name = "Orders", description = "Checkout, payment confirmation and order history"),
        (name = "Reviews", description = "Reviews of delivered orders"),
        (name = "Admin", description = "Back-office endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
