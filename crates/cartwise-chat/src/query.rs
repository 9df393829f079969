//! Catalog query synthesis.
//!
//! Turns an [`Intent`] into a fixed ladder of progressively relaxed,
//! declarative [`CatalogQueryAttempt`]s. Nothing here touches a store; the
//! recommendation assembler decides which attempts actually run.

use cartwise_core::types::{
    AttemptStage, CatalogFilter, CatalogQueryAttempt, SortField, SortKey,
};

use crate::intent::{Intent, PriceRange};

/// Ordering shared by every attempt: best rated, then most reviewed.
const POPULARITY_ORDER: [SortKey; 2] = [
    SortKey::desc(SortField::Rating),
    SortKey::desc(SortField::ReviewCount),
];

/// Builds query plans for intents.
#[derive(Debug, Clone, Copy)]
pub struct QuerySynthesizer {
    page_size: usize,
}

impl Default for QuerySynthesizer {
    fn default() -> Self {
        Self::new(10)
    }
}

impl QuerySynthesizer {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The full ladder for `intent`, most specific attempt first.
    ///
    /// An intent without `has_intent` yields the popularity attempt only.
    pub fn synthesize(&self, intent: &Intent) -> Vec<CatalogQueryAttempt> {
        if !intent.has_intent {
            return self.popular_only();
        }

        let mut plan = Vec::new();

        let mut exact = Vec::new();
        if let Some(category) = intent.category {
            exact.push(CatalogFilter::Category(category));
        }
        if let Some(color) = intent.color {
            exact.push(CatalogFilter::Color(color));
        }
        if let Some(brand) = intent.brand {
            exact.push(CatalogFilter::Brand(brand));
        }
        if let Some(range) = intent.price_range {
            exact.extend(price_filters(&range));
        }
        plan.push(self.attempt(AttemptStage::Exact, exact));

        if let Some(category) = intent.category {
            plan.push(self.attempt(
                AttemptStage::CategoryRelaxed,
                vec![CatalogFilter::Category(category)],
            ));
        }

        if let Some(range) = intent.price_range {
            plan.push(self.attempt(AttemptStage::PriceRelaxed, price_filters(&range)));
        }

        for keyword in &intent.keywords {
            plan.push(self.attempt(
                AttemptStage::Keyword,
                vec![CatalogFilter::TextContains(keyword.clone())],
            ));
        }

        plan.extend(self.popular_only());
        plan
    }

    /// A plan holding only the popularity attempt.
    pub fn popular_only(&self) -> Vec<CatalogQueryAttempt> {
        vec![self.attempt(AttemptStage::Popular, Vec::new())]
    }

    fn attempt(&self, stage: AttemptStage, mut filters: Vec<CatalogFilter>) -> CatalogQueryAttempt {
        filters.push(CatalogFilter::Available);
        CatalogQueryAttempt {
            stage,
            filters,
            order: POPULARITY_ORDER.to_vec(),
            limit: self.page_size,
        }
    }
}

fn price_filters(range: &PriceRange) -> Vec<CatalogFilter> {
    let mut filters = Vec::new();
    if let Some(min) = range.min {
        filters.push(CatalogFilter::PriceAtLeast(min));
    }
    if let Some(max) = range.max {
        filters.push(CatalogFilter::PriceAtMost(max));
    }
    filters
}
