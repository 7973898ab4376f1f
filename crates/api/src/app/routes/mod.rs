use axum::{
    routing::{get, post},
    Router,
};

pub mod catalog;
pub mod movements;
pub mod purchases;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/warehouses", post(catalog::create_warehouse))
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route("/products/low-stock", get(catalog::low_stock_products))
        .route(
            "/purchases",
            get(purchases::get_purchases).post(purchases::create_purchase),
        )
        .route("/inventory-movements", get(movements::list_movements))
}
