use axum::{response::IntoResponse, Json};
use serde_json::json;

// axum handler for `/`
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Fintech platform API operational" }))
}
