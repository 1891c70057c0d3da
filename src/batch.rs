// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch search.
//!
//! One request carries several independent searches in nested parameters:
//!
//! ```text
//! search[][0][q]=vat&search[][0][count]=5&search[][1][q]=passport
//! search[0][q]=vat&search[1][q]=passport          (same thing)
//! ```
//!
//! The first bracketed word groups parameters into a search, the second is
//! the parameter name. Searches keep the order in which their group first
//! appears.
//!
//! Every search is validated before any of them runs: too many searches is a
//! 400, and the first invalid search fails the whole batch with its 422.
//! Valid batches run concurrently and results come back in request order.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::gateway::{GatewayError, SearchGateway, SearchSurface};
use crate::metrics;
use crate::params::RawParams;
use crate::presenter::SearchResponse;

const ENDPOINT: &str = "batch_search";

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<SearchResponse>,
}

/// Words inside `[...]` of a parameter name, skipping empty brackets.
fn bracketed_words(name: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let word = &after[..close];
        if !word.is_empty() && word.chars().all(|c| c.is_alphanumeric() || c == '_') {
            words.push(word);
        }
        rest = &after[close + 1..];
    }
    words
}

/// Split a batch query string into one [`RawParams`] per search.
///
/// Parameters without both a group and a name are ignored.
pub fn split_searches(query: &str) -> Vec<RawParams> {
    let mut groups: Vec<(String, RawParams)> = Vec::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        let words = bracketed_words(&name);
        let [group, param, ..] = words.as_slice() else {
            continue;
        };
        let params = match groups.iter_mut().find(|(g, _)| g == group) {
            Some((_, params)) => params,
            None => {
                groups.push(((*group).to_string(), RawParams::new()));
                let last = groups.len() - 1;
                &mut groups[last].1
            }
        };
        params.push(*param, value.into_owned());
    }
    groups.into_iter().map(|(_, params)| params).collect()
}

/// Validate then run every search of a batch against the general surface.
pub async fn run_batch(
    gateway: &Arc<SearchGateway>,
    searches: &[RawParams],
) -> Result<BatchResponse, GatewayError> {
    let max = gateway.config().max_batch_size;
    if searches.len() > max {
        debug!(searches = searches.len(), max, "Rejected oversized batch");
        metrics::record_validation_error(ENDPOINT, "bad_request");
        return Err(GatewayError::BatchTooLarge(max));
    }
    metrics::record_batch(searches.len());

    let parsed = searches
        .iter()
        .map(|raw| gateway.parse(SearchSurface::Government, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut join_set = JoinSet::new();
    for (i, params) in parsed.into_iter().enumerate() {
        let gateway = Arc::clone(gateway);
        join_set.spawn(async move { (i, gateway.execute(SearchSurface::Government, &params).await) });
    }

    let mut slots: Vec<Option<SearchResponse>> = Vec::new();
    slots.resize_with(searches.len(), || None);
    while let Some(joined) = join_set.join_next().await {
        let (i, result) = joined.map_err(|e| {
            warn!(error = %e, "Batch search task failed");
            EngineError::Unavailable(format!("batch search task failed: {e}"))
        })?;
        slots[i] = Some(result?);
    }

    let results = slots.into_iter().flatten().collect::<Vec<_>>();
    debug!(searches = results.len(), "Batch complete");
    Ok(BatchResponse { results })
}
