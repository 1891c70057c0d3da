// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search gateway.
//!
//! The [`SearchGateway`] ties the pipeline together:
//!
//! ```text
//! RawParams
//!     ↓ SearchParameterParser      (422 / 400 before any engine call)
//! QueryParameters
//!     ↓ BestBetStore::lookup       (unless disable_best_bets)
//! PromotionSet
//!     ↓ SearchRequestBuilder
//! SearchRequest
//!     ↓ SearchEngine::search
//! RawSearchResponse
//!     ├─→ ResultPresenter          (registry snapshot)
//!     ├─→ aggregates + examples
//!     └─→ Suggester
//! SearchResponse
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use search_gateway::{GatewayConfig, InMemoryEngine, RawParams, SearchGateway, SearchSurface};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = InMemoryEngine::new();
//! engine.add_document("government", "edition", "/vat-rates",
//!     json!({"title": "VAT rates", "link": "/vat-rates", "format": "answer"}));
//!
//! let gateway = SearchGateway::new(GatewayConfig::default(), Arc::new(engine)).unwrap();
//! let raw = RawParams::from_query_string("q=vat&fields=title,link");
//! let response = gateway.search(SearchSurface::Government, &raw).await.unwrap();
//!
//! assert_eq!(response.total, 1);
//! assert_eq!(response.results[0]["link"], "/vat-rates");
//! # }
//! ```

mod error;

pub use error::GatewayError;

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::aggregates::{present_aggregates, ExampleFetcher};
use crate::best_bets::{BestBetStore, EngineBestBetStore, PromotionSet};
use crate::config::GatewayConfig;
use crate::engine::{EngineError, EngineHealth, SearchEngine};
use crate::legacy::{AdvancedSearch, LegacyResponse};
use crate::metrics;
use crate::params::{ParserLimits, QueryParameters, RawParams, SearchParameterParser};
use crate::presenter::{required_registries, EntityExpander, ResultPresenter, SearchResponse};
use crate::registry::Registries;
use crate::schema::SearchSchema;
use crate::search::{ElasticsearchTranslator, SearchRequestBuilder};
use crate::suggest::{DictionarySuggester, Suggester, Suggestion};

/// Which parameter surface and indexes a search runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSurface {
    /// `/search.json` over the content indexes
    Government,
    /// `/specialist-documents-search` over the specialist index
    Specialist,
}

impl SearchSurface {
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Government => "search",
            Self::Specialist => "specialist",
        }
    }
}

pub struct SearchGateway {
    config: GatewayConfig,
    engine: Arc<dyn SearchEngine>,
    government: SearchParameterParser,
    specialist: SearchParameterParser,
    best_bets: Arc<dyn BestBetStore>,
    registries: Registries,
    suggester: Arc<dyn Suggester>,
    specialist_indexes: Vec<String>,
}

impl SearchGateway {
    /// Gateway with best bets from the metasearch index and no spelling
    /// dictionary.
    pub fn new(config: GatewayConfig, engine: Arc<dyn SearchEngine>) -> Result<Self, GatewayError> {
        let limits = ParserLimits {
            max_count: config.max_count,
            max_query_words: config.max_query_words,
        };
        let government = SearchParameterParser::new(Arc::new(SearchSchema::government()), limits)?;
        let specialist = SearchParameterParser::new(Arc::new(SearchSchema::specialist()), limits)?;
        let best_bets = Arc::new(EngineBestBetStore::new(engine.clone(), &config.metasearch_index));
        let registries = Registries::new(engine.clone(), &config.registry_index, config.registry_lifetime());
        let specialist_indexes = vec![config.specialist_index.clone()];

        info!(
            content_indexes = ?config.content_indexes,
            specialist_index = %config.specialist_index,
            "Search gateway ready"
        );
        Ok(Self {
            config,
            engine,
            government,
            specialist,
            best_bets,
            registries,
            suggester: Arc::new(DictionarySuggester::default()),
            specialist_indexes,
        })
    }

    pub fn with_best_bets(mut self, store: Arc<dyn BestBetStore>) -> Self {
        self.best_bets = store;
        self
    }

    pub fn with_suggester(mut self, suggester: Arc<dyn Suggester>) -> Self {
        self.suggester = suggester;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    fn parser(&self, surface: SearchSurface) -> &SearchParameterParser {
        match surface {
            SearchSurface::Government => &self.government,
            SearchSurface::Specialist => &self.specialist,
        }
    }

    fn indexes(&self, surface: SearchSurface) -> &[String] {
        match surface {
            SearchSurface::Government => &self.config.content_indexes,
            SearchSurface::Specialist => &self.specialist_indexes,
        }
    }

    /// Validate raw parameters without searching.
    pub fn parse(&self, surface: SearchSurface, raw: &RawParams) -> Result<QueryParameters, GatewayError> {
        self.parser(surface).parse(raw).into_result().map_err(|e| {
            debug!(endpoint = surface.endpoint(), error = %e, "Rejected search parameters");
            let err = GatewayError::from(e);
            metrics::record_validation_error(surface.endpoint(), err.kind());
            err
        })
    }

    /// Parse and run one search.
    pub async fn search(&self, surface: SearchSurface, raw: &RawParams) -> Result<SearchResponse, GatewayError> {
        let params = self.parse(surface, raw)?;
        self.execute(surface, &params).await
    }

    /// Run one already validated search.
    pub async fn execute(
        &self,
        surface: SearchSurface,
        params: &QueryParameters,
    ) -> Result<SearchResponse, GatewayError> {
        let result = self.run(surface, params).await;
        let status = match &result {
            Ok(response) => {
                metrics::record_search_results(response.results.len());
                "success"
            }
            Err(e) => {
                error!(endpoint = surface.endpoint(), error = %e, "Search failed");
                e.kind()
            }
        };
        metrics::record_search(surface.endpoint(), status);
        result
    }

    async fn run(&self, surface: SearchSurface, params: &QueryParameters) -> Result<SearchResponse, GatewayError> {
        let indexes = self.indexes(surface);
        let schema = self.parser(surface).schema();

        let bets = self.promotions(params).await?;
        let request = SearchRequestBuilder::new(params, &bets)
            .content_indexes(&self.config.content_indexes)
            .description_budget(self.config.description_budget)
            .build();

        let response = self.engine.search(indexes, &request).await?;
        debug!(
            endpoint = surface.endpoint(),
            total = response.total,
            hits = response.hits.len(),
            "Engine responded"
        );

        let registries = self.registries.snapshot_of(&required_registries(params)).await;
        let results = ResultPresenter::new(params, schema, &registries)
            .description_budget(self.config.description_budget)
            .present_all(&response.hits);

        let mut aggregates = present_aggregates(params, &response, &EntityExpander::new(&registries));
        ExampleFetcher::new(self.engine.as_ref(), indexes, schema, params, &request.query)
            .attach(&mut aggregates)
            .await?;

        Ok(SearchResponse {
            results,
            total: response.total,
            start: params.start,
            aggregates,
            surface: params.aggregate_surface,
            suggested_queries: self.suggestions(params),
            elasticsearch_query: params
                .debug
                .show_query
                .then(|| ElasticsearchTranslator::request_body(&request)),
        })
    }

    async fn promotions(&self, params: &QueryParameters) -> Result<PromotionSet, EngineError> {
        let Some(query) = params.query.as_deref() else {
            return Ok(PromotionSet::default());
        };
        if params.debug.disable_best_bets || params.similar_to.is_some() {
            return Ok(PromotionSet::default());
        }
        let resolution = self.best_bets.resolution(query).await?;
        if let Some(query_match) = resolution.query_match() {
            metrics::record_best_bets(query_match.as_str());
            debug!(query, query_match = query_match.as_str(), "Best bets apply");
        }
        Ok(resolution.promotion_set())
    }

    fn suggestions(&self, params: &QueryParameters) -> Vec<Suggestion> {
        let Some(query) = params.search_term().filter(|_| params.suggest_spelling()) else {
            return Vec::new();
        };
        let highlighted = params.suggest_with_highlighting();
        self.suggester
            .suggest(query)
            .into_iter()
            .map(|c| Suggestion::from_correction(c, highlighted))
            .collect()
    }

    /// Legacy `/<index>/advanced_search.json`.
    pub async fn advanced_search(&self, index: &str, raw: &RawParams) -> Result<LegacyResponse, GatewayError> {
        let endpoint = "advanced_search";
        if !self.config.legacy_indexes.iter().any(|i| i == index) {
            metrics::record_validation_error(endpoint, "not_found");
            return Err(GatewayError::UnknownIndex(index.to_string()));
        }
        let search = AdvancedSearch::new(index, self.config.max_legacy_page);
        let params = search.parse(raw).map_err(|e| {
            debug!(index, error = %e, "Rejected advanced search parameters");
            let err = GatewayError::from(e);
            metrics::record_validation_error(endpoint, err.kind());
            err
        })?;

        let result = search.execute(self.engine.as_ref(), &params).await.map_err(GatewayError::from);
        match &result {
            Ok(_) => metrics::record_search(endpoint, "success"),
            Err(e) => {
                error!(index, error = %e, "Advanced search failed");
                metrics::record_search(endpoint, e.kind());
            }
        }
        result
    }

    pub async fn health(&self) -> Result<EngineHealth, EngineError> {
        self.engine.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::best_bets::{BestBet, BetEntry, QueryMatch};
    use crate::engine::InMemoryEngine;
    use crate::params::ParseError;
    use async_trait::async_trait;
    use serde_json::json;

    fn engine() -> Arc<InMemoryEngine> {
        let engine = InMemoryEngine::new();
        let docs = [
            ("govuk", "/vat-rates", "VAT rates", "answer", false),
            ("government", "/government/publications/vat-notice", "VAT notice 700", "guide", false),
            ("government", "/government/publications/old-vat", "Old VAT guidance", "guide", true),
            ("detailed", "/guidance/self-assessment", "Self assessment", "guide", false),
        ];
        for (index, link, title, format, withdrawn) in docs {
            engine.add_document(
                index,
                "edition",
                link,
                json!({"title": title, "link": link, "format": format, "is_withdrawn": withdrawn}),
            );
        }
        engine.add_document(
            "specialist-finder",
            "cma_case",
            "/cma-cases/merger",
            json!({"title": "Merger inquiry", "link": "/cma-cases/merger", "case_type": "mergers"}),
        );
        Arc::new(engine)
    }

    fn gateway(engine: Arc<InMemoryEngine>) -> SearchGateway {
        SearchGateway::new(GatewayConfig::default(), engine).unwrap()
    }

    fn raw(query: &str) -> RawParams {
        RawParams::from_query_string(query)
    }

    #[tokio::test]
    async fn test_search_excludes_withdrawn() {
        let gateway = gateway(engine());
        let response = gateway
            .search(SearchSurface::Government, &raw("q=vat&fields=title,link"))
            .await
            .unwrap();
        assert_eq!(response.total, 2);

        let response = gateway
            .search(SearchSurface::Government, &raw("q=vat&debug=include_withdrawn"))
            .await
            .unwrap();
        assert_eq!(response.total, 3);
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_engine() {
        let engine = engine();
        let gateway = gateway(engine.clone());
        let err = gateway
            .search(SearchSurface::Government, &raw("foo=1&bar=2&count=5"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Parse(ParseError::Invalid(ref m)) if m == "Unexpected parameters: foo, bar"
        ));
        assert_eq!(engine.search_count(), 0);
    }

    #[tokio::test]
    async fn test_specialist_surface_uses_specialist_index() {
        let gateway = gateway(engine());
        let response = gateway
            .search(SearchSurface::Specialist, &raw("filter_case_type=mergers&fields=title"))
            .await
            .unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0]["title"], "Merger inquiry");

        let err = gateway
            .search(SearchSurface::Government, &raw("filter_case_type=mergers"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }

    #[tokio::test]
    async fn test_show_query_and_surface_key() {
        let gateway = gateway(engine());
        let response = gateway
            .search(SearchSurface::Government, &raw("q=vat&debug=show_query&facet_format=5"))
            .await
            .unwrap();
        assert!(response.elasticsearch_query.is_some());
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["facets"]["format"]["total_options"], 2);
        assert!(body.get("aggregates").is_none());
    }

    struct FixedBets(Vec<BetEntry>);

    #[async_trait]
    impl BestBetStore for FixedBets {
        async fn candidates(&self, _query: &str) -> Result<Vec<BetEntry>, EngineError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_best_bet_pins_link_first() {
        let bets = FixedBets(vec![BetEntry {
            query: "vat".into(),
            query_match: QueryMatch::Exact,
            best: vec![BestBet {
                link: "/guidance/self-assessment".into(),
                position: 1,
            }],
            worst: vec![],
        }]);
        let gateway = gateway(engine()).with_best_bets(Arc::new(bets));
        let response = gateway
            .search(SearchSurface::Government, &raw("q=vat&fields=link"))
            .await
            .unwrap();
        assert_eq!(response.results[0]["link"], "/guidance/self-assessment");

        let response = gateway
            .search(SearchSurface::Government, &raw("q=vat&fields=link&debug=disable_best_bets"))
            .await
            .unwrap();
        assert_ne!(response.results[0]["link"], "/guidance/self-assessment");
    }

    #[tokio::test]
    async fn test_spelling_suggestions() {
        let suggester = DictionarySuggester::new(["vat", "rates"]);
        let gateway = gateway(engine()).with_suggester(Arc::new(suggester));
        let response = gateway
            .search(SearchSurface::Government, &raw("q=vta+rates&suggest=spelling"))
            .await
            .unwrap();
        assert_eq!(response.suggested_queries, vec![Suggestion::Text("vat rates".into())]);

        let response = gateway
            .search(SearchSurface::Government, &raw("q=vta+rates"))
            .await
            .unwrap();
        assert!(response.suggested_queries.is_empty());
    }

    struct DownEngine;

    #[async_trait]
    impl SearchEngine for DownEngine {
        async fn search(
            &self,
            _indexes: &[String],
            _request: &crate::search::SearchRequest,
        ) -> Result<crate::engine::RawSearchResponse, EngineError> {
            Err(EngineError::Unavailable("connection refused".into()))
        }

        async fn health(&self) -> Result<EngineHealth, EngineError> {
            Err(EngineError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_engine_failure_is_not_an_empty_result() {
        let gateway = SearchGateway::new(GatewayConfig::default(), Arc::new(DownEngine)).unwrap();
        let err = gateway
            .search(SearchSurface::Government, &raw("q=vat&debug=disable_best_bets"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Engine(EngineError::Unavailable(_))));
        assert!(gateway.health().await.is_err());
    }

    #[tokio::test]
    async fn test_advanced_search_on_known_index_only() {
        let gateway = gateway(engine());
        let response = gateway
            .advanced_search("government", &raw("page=1&per_page=10&keywords=vat"))
            .await
            .unwrap();
        assert_eq!(response.total, 1);

        let err = gateway
            .advanced_search("private", &raw("page=1&per_page=10"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnknownIndex(ref i) if i == "private"));

        let err = gateway
            .advanced_search("government", &raw("per_page=10"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Pagination params are required.");
    }
}
