//! SQLite-backed product catalog.
//!
//! [`ProductRepository`] stores products and translates declarative
//! [`CatalogQueryAttempt`]s into parameterised SQL.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::ToSql;
use rusqlite::OptionalExtension;
use tracing::debug;
use uuid::Uuid;

use cartwise_core::error::CartwiseError;
use cartwise_core::store::CatalogStore;
use cartwise_core::types::{
    CatalogFilter, CatalogQueryAttempt, Category, Color, Product, SortDirection, SortField,
};

use crate::db::Database;

const PRODUCT_COLUMNS: &str = "id, name, description, category, color, brand, price, \
     original_price, rating, review_count, image_ref, stock, active";

/// Repository for catalog products.
#[derive(Clone, Debug)]
pub struct ProductRepository {
    db: Arc<Database>,
}

impl ProductRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a product, replacing any existing row with the same id.
    pub fn upsert(&self, product: &Product) -> Result<(), CartwiseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, description, category, color, brand, price,
                                       original_price, rating, review_count, image_ref, stock, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    category = excluded.category,
                    color = excluded.color,
                    brand = excluded.brand,
                    price = excluded.price,
                    original_price = excluded.original_price,
                    rating = excluded.rating,
                    review_count = excluded.review_count,
                    image_ref = excluded.image_ref,
                    stock = excluded.stock,
                    active = excluded.active,
                    updated_at = strftime('%s', 'now')",
                rusqlite::params![
                    product.id.to_string(),
                    product.name,
                    product.description,
                    product.category.as_str(),
                    product.color.as_str(),
                    product.brand,
                    product.price,
                    product.original_price,
                    product.rating as f64,
                    product.review_count as i64,
                    product.image_ref,
                    product.stock as i64,
                    product.active as i32,
                ],
            )
            .map_err(|e| CartwiseError::Storage(format!("Failed to save product: {}", e)))?;
            Ok(())
        })
    }

    /// Find a product by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, CartwiseError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| {
                    Ok(row_to_product(row))
                })
                .optional()
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;

            result.transpose()
        })
    }

    /// Count all stored products, active or not.
    pub fn count(&self) -> Result<u64, CartwiseError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
                .map_err(|e| CartwiseError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Run one query attempt synchronously.
    pub fn query(&self, attempt: &CatalogQueryAttempt) -> Result<Vec<Product>, CartwiseError> {
        let (sql, params_vec) = build_attempt_sql(attempt);
        debug!(stage = attempt.stage.as_str(), sql = %sql, "Catalog query");

        self.db.with_conn(|conn| {
            let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| CartwiseError::Catalog(format!("Query prepare: {}", e)))?;

            let rows = stmt
                .query_map(params_refs.as_slice(), |row| Ok(row_to_product(row)))
                .map_err(|e| CartwiseError::Catalog(format!("Query: {}", e)))?;

            let mut results = Vec::new();
            for row in rows {
                let product = row.map_err(|e| CartwiseError::Catalog(e.to_string()))??;
                results.push(product);
            }
            Ok(results)
        })
    }
}

#[async_trait]
impl CatalogStore for ProductRepository {
    async fn find(&self, attempt: &CatalogQueryAttempt) -> Result<Vec<Product>, CartwiseError> {
        let repo = self.clone();
        let attempt = attempt.clone();
        tokio::task::spawn_blocking(move || repo.query(&attempt))
            .await
            .map_err(|e| CartwiseError::Catalog(format!("Catalog task failed: {}", e)))?
    }
}

// ============================================================================
// SQL construction
// ============================================================================

/// Translate an attempt into a SELECT statement and its bound parameters.
fn build_attempt_sql(attempt: &CatalogQueryAttempt) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    for filter in &attempt.filters {
        match filter {
            CatalogFilter::Category(category) => {
                clauses.push("category = ?");
                params_vec.push(Box::new(category.as_str()));
            }
            CatalogFilter::Color(color) => {
                clauses.push("color = ?");
                params_vec.push(Box::new(color.as_str()));
            }
            CatalogFilter::Brand(brand) => {
                clauses.push("brand = ? COLLATE NOCASE");
                params_vec.push(Box::new(brand.display_name()));
            }
            CatalogFilter::PriceAtLeast(min) => {
                clauses.push("price >= ?");
                params_vec.push(Box::new(*min));
            }
            CatalogFilter::PriceAtMost(max) => {
                clauses.push("price <= ?");
                params_vec.push(Box::new(*max));
            }
            CatalogFilter::TextContains(term) => {
                clauses.push(
                    "(lower(name) LIKE ? ESCAPE '\\' OR lower(description) LIKE ? ESCAPE '\\')",
                );
                let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }
            CatalogFilter::Available => {
                clauses.push("active = 1 AND stock > 0");
            }
        }
    }

    let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let mut order: Vec<String> = attempt
        .order
        .iter()
        .map(|key| {
            let column = match key.field {
                SortField::Rating => "rating",
                SortField::ReviewCount => "review_count",
                SortField::Price => "price",
            };
            let direction = match key.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{column} {direction}")
        })
        .collect();
    // Stable tie-break so identical attempts return identical pages.
    order.push("name ASC".to_string());
    order.push("id ASC".to_string());
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    sql.push_str(" LIMIT ?");
    params_vec.push(Box::new(attempt.limit as i64));

    (sql, params_vec)
}

/// Escape LIKE wildcards so user text matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// ============================================================================
// Row conversion
// ============================================================================

fn row_to_product(row: &rusqlite::Row<'_>) -> Result<Product, CartwiseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let name: String = row
        .get(1)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let description: String = row
        .get(2)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let category_str: String = row
        .get(3)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let color_str: String = row
        .get(4)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let brand: Option<String> = row
        .get(5)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let price: f64 = row
        .get(6)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let original_price: Option<f64> = row
        .get(7)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let rating: f64 = row
        .get(8)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let review_count: i64 = row
        .get(9)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let image_ref: String = row
        .get(10)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let stock: i64 = row
        .get(11)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;
    let active: i32 = row
        .get(12)
        .map_err(|e| CartwiseError::Storage(e.to_string()))?;

    Ok(Product {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| CartwiseError::Storage(format!("Invalid UUID: {}", e)))?,
        name,
        description,
        category: Category::parse(&category_str).ok_or_else(|| {
            CartwiseError::Storage(format!("Unknown category: {}", category_str))
        })?,
        color: Color::parse(&color_str)
            .ok_or_else(|| CartwiseError::Storage(format!("Unknown color: {}", color_str)))?,
        brand,
        price,
        original_price,
        rating: rating as f32,
        review_count: review_count.max(0) as u32,
        image_ref,
        stock: stock.max(0) as u32,
        active: active != 0,
    })
}
