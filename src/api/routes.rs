//! REST endpoints for accounts, flows, assignments, analytics and diagnostics.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use super::extract::ApiJson;
use crate::analytics;
use crate::diagnostics;
use crate::error::ApiError;
use crate::model::{self, Assignment, COLLECTIONS, Flow};
use crate::registry::{self, AssignRequest, ConnectRequest};

/// `?accountId=` filter shared by list and summary endpoints. A blank value
/// means no scope.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountScope {
    pub account_id: Option<String>,
}

/// GET /
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "IG Automation Backend Running" }))
}

/// GET /schema
///
/// Collection names and the JSON Schema of every stored record type.
pub async fn schema() -> impl IntoResponse {
    Json(json!({
        "collections": COLLECTIONS,
        "models": model::schema_map(),
    }))
}

/// POST /connect
pub async fn connect(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConnectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = registry::connect_account(state.store.as_ref(), &req.account_name).await?;
    Ok(Json(json!({ "status": "connected", "accountId": id })))
}

/// POST /flows
pub async fn create_flow(
    State(state): State<AppState>,
    ApiJson(flow): ApiJson<Flow>,
) -> Result<impl IntoResponse, ApiError> {
    let id = registry::create_flow(state.store.as_ref(), &flow).await?;
    Ok(Json(json!({ "id": id })))
}

/// GET /flows
pub async fn list_flows(
    State(state): State<AppState>,
    Query(scope): Query<AccountScope>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = scope.account_id.as_deref();
    let flows = registry::list_flows(state.store.as_ref(), account_id).await?;
    Ok(Json(flows))
}

/// POST /assign
pub async fn assign(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = Assignment::from(req);
    let id = registry::create_assignment(state.store.as_ref(), &assignment).await?;
    Ok(Json(json!({ "id": id })))
}

/// GET /analytics/summary
pub async fn analytics_summary(
    State(state): State<AppState>,
    Query(scope): Query<AccountScope>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = scope.account_id.as_deref();
    let summary = analytics::summarize(state.store.as_ref(), account_id).await?;
    Ok(Json(summary))
}

/// GET /test
///
/// Never fails; store problems are reported in the body.
pub async fn test_connection(State(state): State<AppState>) -> impl IntoResponse {
    Json(diagnostics::run(state.store.as_ref(), &state.configured).await)
}
