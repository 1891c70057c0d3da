// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::warn;

use super::error::ApiError;
use crate::batch::{run_batch, split_searches, BatchResponse};
use crate::engine::EngineHealth;
use crate::gateway::{SearchGateway, SearchSurface};
use crate::legacy::LegacyResponse;
use crate::metrics::LatencyTimer;
use crate::params::RawParams;
use crate::presenter::SearchResponse;

type Gateway = State<Arc<SearchGateway>>;

fn raw_params(query: Option<String>) -> RawParams {
    RawParams::from_query_string(query.as_deref().unwrap_or_default())
}

pub async fn search(
    State(gateway): Gateway,
    RawQuery(query): RawQuery,
) -> Result<Json<SearchResponse>, ApiError> {
    let _timer = LatencyTimer::new("search");
    let response = gateway
        .search(SearchSurface::Government, &raw_params(query))
        .await?;
    Ok(Json(response))
}

pub async fn specialist_search(
    State(gateway): Gateway,
    RawQuery(query): RawQuery,
) -> Result<Json<SearchResponse>, ApiError> {
    let _timer = LatencyTimer::new("specialist");
    let response = gateway
        .search(SearchSurface::Specialist, &raw_params(query))
        .await?;
    Ok(Json(response))
}

pub async fn batch_search(
    State(gateway): Gateway,
    RawQuery(query): RawQuery,
) -> Result<Json<BatchResponse>, ApiError> {
    let _timer = LatencyTimer::new("batch_search");
    let searches = split_searches(query.as_deref().unwrap_or_default());
    let response = run_batch(&gateway, &searches).await?;
    Ok(Json(response))
}

pub async fn advanced_search(
    State(gateway): Gateway,
    Path(index): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<LegacyResponse>, ApiError> {
    let _timer = LatencyTimer::new("advanced_search");
    let response = gateway.advanced_search(&index, &raw_params(query)).await?;
    Ok(Json(response))
}

pub async fn health(State(gateway): Gateway) -> Response {
    match gateway.health().await {
        Ok(health) => Json(health).into_response(),
        Err(e) => {
            warn!(error = %e, "Engine health check failed");
            let health = EngineHealth {
                status: "unavailable".into(),
                detail: Some(e.to_string()),
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
        }
    }
}
