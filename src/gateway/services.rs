use axum::{
    Json,
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::cache::CachedResponse;
use crate::controller::ViewState;
use crate::downloads::JobRecord;
use crate::intercept::{InterceptedRequest, Resolution};
use crate::observability::MetricsSnapshot;

use super::error::GatewayError;
use super::state::AppState;

/// Upper bound on buffered request bodies for intercepted traffic.
const MAX_INTERCEPT_BODY: usize = 32 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct AbortResponse {
    pub id: String,
    pub aborted: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn offline_status(
    State(state): State<AppState>,
) -> Result<Json<ViewState>, GatewayError> {
    Ok(Json(state.controller.query_status().await?))
}

pub async fn make_offline(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<JobRecord>), GatewayError> {
    let record = state.controller.make_offline().await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

pub async fn make_online_only(
    State(state): State<AppState>,
) -> Result<Json<ViewState>, GatewayError> {
    Ok(Json(state.controller.make_online_only().await?))
}

pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, GatewayError> {
    let record = state
        .manager
        .lookup(&id)?
        .ok_or_else(|| GatewayError::NotFound(format!("download {id}")))?;
    Ok(Json(record))
}

pub async fn abort_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AbortResponse>, GatewayError> {
    let aborted = state.manager.abort(&id).await;
    if !aborted && state.manager.lookup(&id)?.is_none() {
        return Err(GatewayError::NotFound(format!("download {id}")));
    }
    Ok(Json(AbortResponse { id, aborted }))
}

pub async fn notification_clicked(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, GatewayError> {
    if state.manager.lookup(&id)?.is_none() {
        return Err(GatewayError::NotFound(format!("download {id}")));
    }
    state.manager.notification_clicked(&id);
    Ok(StatusCode::NO_CONTENT)
}

/// Fallback route: everything the explicit routes do not claim goes through
/// the interceptor, which answers from cache, substitutes when offline, or
/// hands the request back for live proxying.
pub async fn intercept(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, GatewayError> {
    let method = request.method().as_str().to_string();
    let headers = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let url = state.config.resolve_url(&path);

    let body = axum::body::to_bytes(request.into_body(), MAX_INTERCEPT_BODY)
        .await
        .map_err(|e| GatewayError::Internal(format!("request body: {e}")))?;

    let intercepted = InterceptedRequest {
        method,
        url,
        headers,
        body,
    };

    match state.interceptor.resolve(&intercepted).await? {
        Resolution::Respond(cached) => Ok(into_http_response(cached)),
        Resolution::PassThrough => {
            let live = state.proxy.fetch(&intercepted).await?;
            Ok(into_http_response(live))
        }
    }
}

fn into_http_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);
    for (name, value) in &cached.headers {
        builder = builder.header(name, value);
    }
    match builder.body(Body::from(cached.body)) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Cached response could not be replayed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
