use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// `GET /inventory-movements[?product_id=][&warehouse_id=]`, newest first.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::MovementQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services.list_movements(query.into()).await {
        Ok(movements) => Json(dto::MovementListResponse { movements }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
