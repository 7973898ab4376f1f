use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use stockroom_purchasing::{NewProduct, NewWarehouse};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewWarehouse>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services.create_warehouse(body).await {
        Ok(warehouse) => (
            StatusCode::CREATED,
            Json(dto::WarehouseCreatedResponse {
                message: "warehouse created successfully",
                warehouse,
            }),
        )
            .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services.create_product(body).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(dto::ProductCreatedResponse {
                message: "product created successfully",
                product,
            }),
        )
            .into_response(),
        Err(e) => errors::catalog_error_to_response(e),
    }
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.list_products().await {
        Ok(products) => Json(dto::ProductListResponse { products }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// `GET /products/low-stock`: products at or below their reorder level.
pub async fn low_stock_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.low_stock_products().await {
        Ok(products) => Json(dto::ProductListResponse { products }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
