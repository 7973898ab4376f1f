use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_infra::{CatalogError, PurchaseError};
use stockroom_infra::store::StoreError;

pub fn purchase_error_to_response(err: PurchaseError) -> axum::response::Response {
    match err {
        PurchaseError::Validation(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        e @ (PurchaseError::WarehouseNotFound(_) | PurchaseError::ProductNotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", e.to_string())
        }
        PurchaseError::Persistence(e) => store_error_to_response(e),
    }
}

pub fn catalog_error_to_response(err: CatalogError) -> axum::response::Response {
    match err {
        CatalogError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        e @ CatalogError::DuplicateSku(_) => json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        CatalogError::Persistence(e) => store_error_to_response(e),
    }
}

/// Storage detail is logged, never returned.
pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    tracing::error!(error = %err, "storage failure");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal storage error",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
