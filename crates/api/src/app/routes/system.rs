use axum::{response::IntoResponse, Extension, Json};

use crate::context::PrincipalContext;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id(),
        "role": principal.role().as_str(),
        "warehouse_id": principal.warehouse_id(),
    }))
}
