//! Recommendation assembly.
//!
//! Executes a query plan against the catalog with per-stage gating,
//! deduplicates the merged results and composes a deterministic summary.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use cartwise_core::config::RecommendationConfig;
use cartwise_core::store::CatalogStore;
use cartwise_core::types::{AttemptStage, CatalogQueryAttempt, Product};

use crate::intent::{Intent, IntentExtractor};
use crate::query::QuerySynthesizer;

/// Products recommended for one user message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub has_recommendations: bool,
    /// Deduplicated by id, first-seen order.
    pub products: Vec<Product>,
    pub summary_text: String,
    pub search_query: String,
    pub source_intent: Intent,
}

impl RecommendationResult {
    fn none(intent: Intent) -> Self {
        Self {
            has_recommendations: false,
            products: Vec::new(),
            summary_text: String::new(),
            search_query: String::new(),
            source_intent: intent,
        }
    }

    pub fn product_ids(&self) -> Vec<uuid::Uuid> {
        self.products.iter().map(|p| p.id).collect()
    }
}

/// Runs intent extraction, query synthesis and catalog lookups.
pub struct RecommendationAssembler {
    catalog: Arc<dyn CatalogStore>,
    extractor: IntentExtractor,
    synthesizer: QuerySynthesizer,
    max_products: usize,
    min_results: usize,
}

impl RecommendationAssembler {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: &RecommendationConfig) -> Self {
        Self::with_limits(
            catalog,
            config.page_size,
            config.max_products,
            config.min_results,
        )
    }

    pub fn with_limits(
        catalog: Arc<dyn CatalogStore>,
        page_size: usize,
        max_products: usize,
        min_results: usize,
    ) -> Self {
        Self {
            catalog,
            extractor: IntentExtractor::new(),
            synthesizer: QuerySynthesizer::new(page_size),
            max_products: max_products.max(1),
            min_results,
        }
    }

    pub fn extractor(&self) -> &IntentExtractor {
        &self.extractor
    }

    /// Recommend products for `text`.
    ///
    /// Without a detected intent this returns immediately with
    /// `has_recommendations == false` and never touches the catalog.
    pub async fn recommend(&self, text: &str) -> RecommendationResult {
        let intent = self.extractor.extract(text);
        if !intent.has_intent {
            return RecommendationResult::none(intent);
        }
        self.recommend_intent(intent).await
    }

    /// Like [`recommend`](Self::recommend), but an explicit request without
    /// a detected intent falls back to the most popular products.
    pub async fn recommend_requested(&self, text: &str) -> RecommendationResult {
        let intent = self.extractor.extract(text);
        if intent.has_intent {
            return self.recommend_intent(intent).await;
        }

        let products = self.execute(&self.synthesizer.popular_only()).await;
        if products.is_empty() {
            return RecommendationResult::none(intent);
        }
        info!(count = products.len(), "Recommended popular products");
        RecommendationResult {
            has_recommendations: true,
            summary_text: popular_summary(products.len()),
            search_query: String::new(),
            products,
            source_intent: intent,
        }
    }

    async fn recommend_intent(&self, intent: Intent) -> RecommendationResult {
        let plan = self.synthesizer.synthesize(&intent);
        let products = self.execute(&plan).await;
        let summary_text = compose_summary(&intent, products.len());
        info!(
            count = products.len(),
            keywords = ?intent.keywords,
            "Recommended products"
        );

        RecommendationResult {
            has_recommendations: true,
            search_query: intent.keywords.join(" "),
            summary_text,
            products,
            source_intent: intent,
        }
    }

    /// Run the plan's attempts in order, honouring each stage's gate.
    async fn execute(&self, plan: &[CatalogQueryAttempt]) -> Vec<Product> {
        let mut products: Vec<Product> = Vec::new();
        let mut seen = HashSet::new();

        for attempt in plan {
            if products.len() >= self.max_products {
                break;
            }

            let run = match attempt.stage {
                AttemptStage::Exact => true,
                AttemptStage::CategoryRelaxed | AttemptStage::PriceRelaxed => {
                    products.len() < self.min_results
                }
                AttemptStage::Keyword => products.len() < self.max_products,
                AttemptStage::Popular => products.is_empty(),
            };
            if !run {
                debug!(stage = attempt.stage.as_str(), "Skipping attempt");
                continue;
            }

            let found = match self.catalog.find(attempt).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(stage = attempt.stage.as_str(), error = %e, "Catalog attempt failed");
                    continue;
                }
            };
            debug!(
                stage = attempt.stage.as_str(),
                found = found.len(),
                "Catalog attempt finished"
            );

            for product in found {
                if products.len() >= self.max_products {
                    break;
                }
                if seen.insert(product.id) {
                    products.push(product);
                }
            }
        }

        products
    }
}

// =============================================================================
// Summary text
// =============================================================================

/// Human-readable description of an intent, e.g. "Red Nike Shoes under 500".
pub fn describe_intent(intent: &Intent) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(color) = intent.color {
        parts.push(color.display_name().to_string());
    }
    if let Some(brand) = intent.brand {
        parts.push(brand.display_name().to_string());
    }
    match intent.category {
        Some(category) => parts.push(category.display_name().to_string()),
        None => parts.push("products".to_string()),
    }
    if let Some(price) = intent.price_range.and_then(|r| r.describe()) {
        parts.push(price);
    }
    parts.join(" ")
}

fn compose_summary(intent: &Intent, count: usize) -> String {
    let description = describe_intent(intent);
    match count {
        0 => format!(
            "Sorry, I couldn't find any {} right now. Try widening your search.",
            description
        ),
        1 => format!("Here is 1 pick for {}.", description),
        n => format!("Here are {} picks for {}.", n, description),
    }
}

fn popular_summary(count: usize) -> String {
    if count == 1 {
        "Here is 1 popular pick you might like.".to_string()
    } else {
        format!("Here are {} popular picks you might like.", count)
    }
}
