use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Catalog vocabulary
// =============================================================================

/// Canonical product category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Shoes,
    Clothing,
    Bags,
    Electronics,
    Beauty,
    Sports,
    HomeGoods,
    Accessories,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Shoes,
        Category::Clothing,
        Category::Bags,
        Category::Electronics,
        Category::Beauty,
        Category::Sports,
        Category::HomeGoods,
        Category::Accessories,
    ];

    /// Storage key, also the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Shoes => "shoes",
            Category::Clothing => "clothing",
            Category::Bags => "bags",
            Category::Electronics => "electronics",
            Category::Beauty => "beauty",
            Category::Sports => "sports",
            Category::HomeGoods => "home_goods",
            Category::Accessories => "accessories",
        }
    }

    /// Human-readable name used in recommendation summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Shoes => "Shoes",
            Category::Clothing => "Clothing",
            Category::Bags => "Bags",
            Category::Electronics => "Electronics",
            Category::Beauty => "Beauty",
            Category::Sports => "Sports Gear",
            Category::HomeGoods => "Home Goods",
            Category::Accessories => "Accessories",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Canonical product color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Blue,
    Black,
    White,
    Green,
    Yellow,
    Pink,
    Gray,
    Brown,
    Purple,
    Orange,
}

impl Color {
    pub const ALL: [Color; 11] = [
        Color::Red,
        Color::Blue,
        Color::Black,
        Color::White,
        Color::Green,
        Color::Yellow,
        Color::Pink,
        Color::Gray,
        Color::Brown,
        Color::Purple,
        Color::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Red => "red",
            Color::Blue => "blue",
            Color::Black => "black",
            Color::White => "white",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Gray => "gray",
            Color::Brown => "brown",
            Color::Purple => "purple",
            Color::Orange => "orange",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Blue => "Blue",
            Color::Black => "Black",
            Color::White => "White",
            Color::Green => "Green",
            Color::Yellow => "Yellow",
            Color::Pink => "Pink",
            Color::Gray => "Gray",
            Color::Brown => "Brown",
            Color::Purple => "Purple",
            Color::Orange => "Orange",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Brands the assistant recognises by name.
///
/// Products store the brand as free text; a brand filter matches the
/// product's brand against [`Brand::display_name`] case-insensitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Brand {
    Nike,
    Adidas,
    Puma,
    NewBalance,
    LiNing,
    Anta,
    Apple,
    Samsung,
    Huawei,
    Xiaomi,
    Sony,
    Uniqlo,
    Zara,
    Coach,
}

impl Brand {
    pub const ALL: [Brand; 14] = [
        Brand::Nike,
        Brand::Adidas,
        Brand::Puma,
        Brand::NewBalance,
        Brand::LiNing,
        Brand::Anta,
        Brand::Apple,
        Brand::Samsung,
        Brand::Huawei,
        Brand::Xiaomi,
        Brand::Sony,
        Brand::Uniqlo,
        Brand::Zara,
        Brand::Coach,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Brand::Nike => "Nike",
            Brand::Adidas => "Adidas",
            Brand::Puma => "Puma",
            Brand::NewBalance => "New Balance",
            Brand::LiNing => "Li-Ning",
            Brand::Anta => "Anta",
            Brand::Apple => "Apple",
            Brand::Samsung => "Samsung",
            Brand::Huawei => "Huawei",
            Brand::Xiaomi => "Xiaomi",
            Brand::Sony => "Sony",
            Brand::Uniqlo => "Uniqlo",
            Brand::Zara => "Zara",
            Brand::Coach => "Coach",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog item as read by the recommendation pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub color: Color,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub image_ref: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Active and in stock.
    pub fn is_available(&self) -> bool {
        self.active && self.stock > 0
    }
}

// =============================================================================
// Declarative catalog queries
// =============================================================================

/// One constraint of a catalog query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum CatalogFilter {
    Category(Category),
    Color(Color),
    Brand(Brand),
    PriceAtLeast(f64),
    PriceAtMost(f64),
    /// Case-insensitive substring of the name or description.
    TextContains(String),
    /// Active items with stock remaining.
    Available,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Rating,
    ReviewCount,
    Price,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub const fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Rung of the recommendation fallback ladder an attempt belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Exact,
    CategoryRelaxed,
    PriceRelaxed,
    Keyword,
    Popular,
}

impl AttemptStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStage::Exact => "exact",
            AttemptStage::CategoryRelaxed => "category_relaxed",
            AttemptStage::PriceRelaxed => "price_relaxed",
            AttemptStage::Keyword => "keyword",
            AttemptStage::Popular => "popular",
        }
    }
}

/// A declarative catalog query. Building one never touches a store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogQueryAttempt {
    pub stage: AttemptStage,
    pub filters: Vec<CatalogFilter>,
    pub order: Vec<SortKey>,
    pub limit: usize,
}

impl CatalogQueryAttempt {
    /// Check a product against every filter of this attempt.
    ///
    /// Stores without a query language (fixtures, caches) use this directly.
    pub fn matches(&self, product: &Product) -> bool {
        self.filters.iter().all(|filter| match filter {
            CatalogFilter::Category(c) => product.category == *c,
            CatalogFilter::Color(c) => product.color == *c,
            CatalogFilter::Brand(b) => product
                .brand
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(b.display_name())),
            CatalogFilter::PriceAtLeast(min) => product.price >= *min,
            CatalogFilter::PriceAtMost(max) => product.price <= *max,
            CatalogFilter::TextContains(term) => {
                let term = term.to_lowercase();
                product.name.to_lowercase().contains(&term)
                    || product.description.to_lowercase().contains(&term)
            }
            CatalogFilter::Available => product.is_available(),
        })
    }
}

// =============================================================================
// Conversation records
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation between one user and one assistant persona.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub persona_id: String,
    pub created_at: Timestamp,
}

/// A persisted transcript entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub persona_id: Option<String>,
    /// Referenced products in display order.
    pub product_ids: Vec<Uuid>,
    pub created_at: Timestamp,
}

/// Input for creating a [`Message`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    pub persona_id: Option<String>,
    pub product_ids: Vec<Uuid>,
}

impl NewMessage {
    pub fn user(session_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            session_id,
            role: Role::User,
            content: content.into(),
            persona_id: None,
            product_ids: Vec::new(),
        }
    }

    pub fn assistant(session_id: Uuid, content: impl Into<String>, persona_id: Option<String>) -> Self {
        Self {
            session_id,
            role: Role::Assistant,
            content: content.into(),
            persona_id,
            product_ids: Vec::new(),
        }
    }

    pub fn with_products(mut self, product_ids: Vec<Uuid>) -> Self {
        self.product_ids = product_ids;
        self
    }
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in milliseconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}
