//! Axum handlers. Each one decodes, hands off to [`MetricsService`] and
//! renders the result.
//!
//! [`MetricsService`]: crate::services::MetricsService

use axum::extract::{Path, State};
use axum::response::Html;
use axum::Json;
use bytes::Bytes;

use metrix_core::protocol::MetricMessage;

use crate::app_state::AppState;
use crate::transport::{codec, ApiError};

type ApiResult<T> = std::result::Result<T, ApiError>;

/// `POST /update/{type}/{name}/{value}`
pub async fn update_path(
    State(state): State<AppState>,
    Path((mtype, name, value)): Path<(String, String, String)>,
) -> ApiResult<&'static str> {
    let msg = codec::decode_path(&mtype, &name, &value)?;
    state.service().update(vec![msg]).await?;
    Ok("ok")
}

/// `POST /update` with one JSON object.
pub async fn update_json(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<MetricMessage>> {
    let msg = codec::decode_one(&body)?;
    let mut out = state.service().update(vec![msg]).await?;
    let updated = out
        .pop()
        .ok_or_else(|| metrix_core::MetrixError::Internal("update returned nothing".into()))?;
    Ok(Json(updated))
}

/// `POST /updates` with an array (or a single object).
pub async fn update_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Vec<MetricMessage>>> {
    let msgs = codec::decode_batch(&body)?;
    Ok(Json(state.service().update(msgs).await?))
}

/// `GET /value/{type}/{name}` answering the bare value.
pub async fn value_path(
    State(state): State<AppState>,
    Path((mtype, name)): Path<(String, String)>,
) -> ApiResult<String> {
    let query = MetricMessage::query(name, mtype);
    Ok(state.service().lookup(&query).await?.string_value())
}

/// `POST /value` with `{id, type}` answering the full object.
pub async fn value_json(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<MetricMessage>> {
    let query = codec::decode_one(&body)?;
    Ok(Json(state.service().lookup_message(&query).await?))
}

/// `GET /` and `GET /metrics`
pub async fn report(State(state): State<AppState>) -> ApiResult<Html<String>> {
    Ok(Html(state.service().report().await?))
}

/// `GET /ping`
pub async fn ping(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.service().ping().await?;
    Ok("ok")
}
