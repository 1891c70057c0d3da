// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Elasticsearch HTTP client.
//!
//! Requests are translated with [`ElasticsearchTranslator`] and POSTed to
//! `<base>/<index,index>/_search`. Every call goes through a circuit breaker;
//! nothing is retried inline.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::traits::{
    AggregationResult, Bucket, EngineError, EngineHealth, RawHit, RawSearchResponse, SearchEngine,
};
use crate::resilience::{CircuitBreaker, CircuitConfig, CircuitError};
use crate::search::{ElasticsearchTranslator, SearchRequest, FILTERED_AGGREGATIONS};

const BACKEND: &str = "elasticsearch";

pub struct ElasticsearchClient {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
    circuit: CircuitBreaker,
}

impl ElasticsearchClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_circuit(base_url, timeout, CircuitConfig::default())
    }

    pub fn with_circuit(base_url: impl Into<String>, timeout: Duration, circuit: CircuitConfig) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            timeout,
            circuit: CircuitBreaker::new(BACKEND, circuit),
        }
    }

    #[must_use]
    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, EngineError> {
        let start = Instant::now();
        let result = self
            .circuit
            .call(|| async move {
                let response = request
                    .timeout(self.timeout)
                    .send()
                    .await
                    .map_err(transport_error)?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(EngineError::Backend {
                        status: status.as_u16(),
                        body,
                    });
                }
                response
                    .json::<Value>()
                    .await
                    .map_err(|e| EngineError::MalformedResponse(e.to_string()))
            })
            .await;
        crate::metrics::record_engine_latency(BACKEND, start.elapsed());

        match result {
            Ok(body) => {
                crate::metrics::record_engine_call(BACKEND, "success");
                Ok(body)
            }
            Err(CircuitError::Rejected) => {
                crate::metrics::record_engine_call(BACKEND, "rejected");
                Err(EngineError::Unavailable("circuit breaker open".into()))
            }
            Err(CircuitError::Inner(e)) => {
                let status = if e == EngineError::Timeout { "timeout" } else { "error" };
                crate::metrics::record_engine_call(BACKEND, status);
                error!(error = %e, "Elasticsearch request failed");
                Err(e)
            }
        }
    }
}

fn transport_error(err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout
    } else {
        EngineError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl SearchEngine for ElasticsearchClient {
    async fn search(
        &self,
        indexes: &[String],
        request: &SearchRequest,
    ) -> Result<RawSearchResponse, EngineError> {
        let url = format!("{}/{}/_search", self.base_url, indexes.join(","));
        let body = ElasticsearchTranslator::request_body(request);
        debug!(url = %url, "Elasticsearch search");
        let response = self.send(self.http.post(&url).json(&body)).await?;
        parse_response(&response)
    }

    async fn multi_search(
        &self,
        searches: &[(Vec<String>, SearchRequest)],
    ) -> Result<Vec<RawSearchResponse>, EngineError> {
        if searches.is_empty() {
            return Ok(Vec::new());
        }
        let mut body = String::new();
        for (indexes, request) in searches {
            body.push_str(&serde_json::json!({ "index": indexes.join(",") }).to_string());
            body.push('\n');
            body.push_str(&ElasticsearchTranslator::request_body(request).to_string());
            body.push('\n');
        }
        let url = format!("{}/_msearch", self.base_url);
        let response = self
            .send(
                self.http
                    .post(&url)
                    .header("Content-Type", "application/x-ndjson")
                    .body(body),
            )
            .await?;

        let responses = response
            .get("responses")
            .and_then(Value::as_array)
            .ok_or_else(|| EngineError::MalformedResponse("missing responses".into()))?;
        responses
            .iter()
            .map(|item| match item.get("error") {
                Some(error) => Err(EngineError::Backend {
                    status: item.get("status").and_then(Value::as_u64).unwrap_or(500) as u16,
                    body: error.to_string(),
                }),
                None => parse_response(item),
            })
            .collect()
    }

    async fn health(&self) -> Result<EngineHealth, EngineError> {
        let url = format!("{}/_cluster/health", self.base_url);
        let response = self.send(self.http.get(&url)).await?;
        Ok(EngineHealth {
            status: response
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            detail: response
                .get("cluster_name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Decode a `_search` response body.
pub fn parse_response(body: &Value) -> Result<RawSearchResponse, EngineError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| EngineError::MalformedResponse("missing hits".into()))?;
    let total = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => return Err(EngineError::MalformedResponse("missing hits.total".into())),
    };

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_hit).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let aggregations = body
        .get("aggregations")
        .and_then(Value::as_object)
        .map(|aggs| {
            aggs.iter()
                .filter_map(|(name, value)| parse_aggregation(value).map(|r| (name.clone(), r)))
                .collect()
        })
        .unwrap_or_default();

    Ok(RawSearchResponse {
        total,
        hits,
        aggregations,
    })
}

fn parse_hit(hit: &Value) -> Result<RawHit, EngineError> {
    let text = |key: &str| hit.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedResponse("hit without _id".into()))?;

    let highlight: BTreeMap<String, Vec<String>> = hit
        .get("highlight")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(field, fragments)| {
                    let fragments = fragments
                        .as_array()
                        .map(|f| f.iter().filter_map(Value::as_str).map(str::to_string).collect())
                        .unwrap_or_default();
                    (field.clone(), fragments)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RawHit {
        index: text("_index"),
        doc_type: text("_type"),
        id: id.to_string(),
        score: hit.get("_score").and_then(Value::as_f64),
        source: hit
            .get("_source")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new),
        highlight,
        explanation: hit.get("_explanation").cloned(),
    })
}

fn parse_aggregation(value: &Value) -> Option<AggregationResult> {
    let inner = value.get(FILTERED_AGGREGATIONS).unwrap_or(value);
    if let Some(buckets) = inner.get("buckets").and_then(Value::as_array) {
        let buckets = buckets
            .iter()
            .filter_map(|bucket| {
                let key = match bucket.get("key_as_string").or_else(|| bucket.get("key"))? {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(Bucket {
                    key,
                    doc_count: bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                })
            })
            .collect();
        return Some(AggregationResult::Terms { buckets });
    }
    inner
        .get("doc_count")
        .and_then(Value::as_u64)
        .map(|doc_count| AggregationResult::Missing { doc_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_response_hits_and_aggregations() {
        let body = json!({
            "hits": {
                "total": {"value": 12, "relation": "eq"},
                "hits": [{
                    "_index": "govuk-2024", "_type": "edition", "_id": "/vat-rates",
                    "_score": 3.5, "_source": {"title": "VAT rates"},
                    "highlight": {"title": ["<mark>VAT</mark> rates"]}
                }]
            },
            "aggregations": {
                "format": {"doc_count": 12, "filtered_aggregations": {"buckets": [
                    {"key": "answer", "doc_count": 7}, {"key": "guide", "doc_count": 5}
                ]}},
                "format_with_missing_value": {"doc_count": 12, "filtered_aggregations": {"doc_count": 2}}
            }
        });
        let response = parse_response(&body).unwrap();
        assert_eq!(response.total, 12);
        assert_eq!(response.hits[0].id, "/vat-rates");
        assert_eq!(response.hits[0].score, Some(3.5));
        assert_eq!(response.hits[0].highlight["title"], vec!["<mark>VAT</mark> rates"]);
        assert_eq!(response.buckets("format").len(), 2);
        assert_eq!(response.missing_count("format_with_missing_value"), 2);
    }

    #[test]
    fn test_parse_response_legacy_total_and_null_score() {
        let body = json!({"hits": {"total": 1, "hits": [{"_id": "a", "_score": null, "_source": {}}]}});
        let response = parse_response(&body).unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].score, None);
    }

    #[test]
    fn test_parse_response_rejects_malformed() {
        assert!(matches!(
            parse_response(&json!({"took": 3})),
            Err(EngineError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_response(&json!({"hits": {"total": 1, "hits": [{"_score": 1.0}]}})),
            Err(EngineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_boolean_bucket_keys_use_string_form() {
        let agg = json!({"buckets": [{"key": 1, "key_as_string": "true", "doc_count": 3}]});
        assert_eq!(
            parse_aggregation(&agg),
            Some(AggregationResult::Terms {
                buckets: vec![Bucket { key: "true".into(), doc_count: 3 }]
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_unavailable() {
        let client = ElasticsearchClient::new("http://127.0.0.1:1", Duration::from_millis(200));
        let result = client
            .search(&["govuk".to_string()], &SearchRequest::new(crate::search::Query::match_all(), 1))
            .await;
        assert!(matches!(result, Err(EngineError::Unavailable(_)) | Err(EngineError::Timeout)));
    }
}
