//! Catalog import from JSON.
//!
//! Accepts either a bare array of products or an object with a
//! `products` array, using the camelCase product representation.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use cartwise_core::error::CartwiseError;
use cartwise_core::types::Product;

use crate::catalog::ProductRepository;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Bare(Vec<Product>),
    Wrapped { products: Vec<Product> },
}

/// Outcome of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Parse `json` and upsert every valid product into `repo`.
///
/// Products with an empty name or a negative or non-finite price are
/// skipped and logged; a malformed document fails the whole import.
pub fn import_catalog_json(
    repo: &ProductRepository,
    json: &str,
) -> Result<ImportSummary, CartwiseError> {
    let products = match serde_json::from_str::<CatalogFile>(json)? {
        CatalogFile::Bare(products) => products,
        CatalogFile::Wrapped { products } => products,
    };

    let mut summary = ImportSummary::default();
    for product in &products {
        if product.name.trim().is_empty() || !product.price.is_finite() || product.price < 0.0 {
            warn!(id = %product.id, "Skipping invalid product");
            summary.skipped += 1;
            continue;
        }
        repo.upsert(product)?;
        summary.imported += 1;
    }

    info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "Catalog import finished"
    );
    Ok(summary)
}

/// Read a catalog file from disk and import it.
pub fn import_catalog_file(
    repo: &ProductRepository,
    path: &Path,
) -> Result<ImportSummary, CartwiseError> {
    let content = std::fs::read_to_string(path)?;
    import_catalog_json(repo, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use crate::db::Database;

    fn make_repo() -> ProductRepository {
        ProductRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    const TWO_PRODUCTS: &str = r#"[
        {"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a01", "name": "Air Zoom", "category": "shoes",
         "color": "red", "brand": "Nike", "price": 459.0, "rating": 4.7, "reviewCount": 230,
         "stock": 12},
        {"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a02", "name": "City Tote", "category": "bags",
         "color": "black", "price": 129.0, "originalPrice": 159.0, "stock": 3, "active": false}
    ]"#;

    #[test]
    fn test_import_bare_array() {
        let repo = make_repo();
        let summary = import_catalog_json(&repo, TWO_PRODUCTS).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 2,
                skipped: 0
            }
        );
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_import_wrapped_object() {
        let repo = make_repo();
        let json = format!(r#"{{"products": {TWO_PRODUCTS}}}"#);
        let summary = import_catalog_json(&repo, &json).unwrap();
        assert_eq!(summary.imported, 2);
    }

    #[test]
    fn test_import_is_idempotent() {
        let repo = make_repo();
        import_catalog_json(&repo, TWO_PRODUCTS).unwrap();
        import_catalog_json(&repo, TWO_PRODUCTS).unwrap();
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_import_skips_invalid_products() {
        let repo = make_repo();
        let json = r#"[
            {"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a03", "name": "  ", "category": "beauty",
             "color": "pink", "price": 10.0},
            {"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a04", "name": "Lipstick", "category": "beauty",
             "color": "pink", "price": -5.0},
            {"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a05", "name": "Serum", "category": "beauty",
             "color": "white", "price": 35.0}
        ]"#;
        let summary = import_catalog_json(&repo, json).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_import_rejects_unknown_category() {
        let repo = make_repo();
        let json = r#"[{"id": "7b0c1a52-3f7e-4d59-9a7e-0c6f1f1e2a06", "name": "Sofa",
                        "category": "furniture", "color": "gray", "price": 900.0}]"#;
        let err = import_catalog_json(&repo, json).unwrap_err();
        assert!(matches!(err, CartwiseError::Serialization(_)));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_import_catalog_file() {
        let repo = make_repo();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_PRODUCTS.as_bytes()).unwrap();

        let summary = import_catalog_file(&repo, file.path()).unwrap();
        assert_eq!(summary.imported, 2);
    }
}
