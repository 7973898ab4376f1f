use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

/// `POST /purchases`: record a receipt on behalf of the token's user.
pub async fn create_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreatePurchaseRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match services
        .create_purchase(body.into(), principal.user_id())
        .await
    {
        Ok(purchase) => (
            StatusCode::CREATED,
            Json(dto::PurchaseCreatedResponse::new(purchase)),
        )
            .into_response(),
        Err(e) => errors::purchase_error_to_response(e),
    }
}

/// `GET /purchases` lists newest first; `GET /purchases?id=` fetches one.
pub async fn get_purchases(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PurchaseQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };

    match query.id {
        Some(id) => match services.get_purchase(id).await {
            Ok(Some(purchase)) => Json(dto::PurchaseEnvelope {
                purchase: purchase.into(),
            })
            .into_response(),
            Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase not found"),
            Err(e) => errors::store_error_to_response(e),
        },
        None => match services.list_purchases().await {
            Ok(purchases) => Json(dto::PurchaseListResponse {
                purchases: purchases.into_iter().map(Into::into).collect(),
            })
            .into_response(),
            Err(e) => errors::store_error_to_response(e),
        },
    }
}
