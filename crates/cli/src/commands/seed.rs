//! Seed the catalogue with products.
//!
//! Reads a JSON array in the same shape as `POST /api/products` and inserts
//! each product whose slug is not already taken, so the command can be
//! re-run safely.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use shopfront_api::db::{self, ProductRepository, RepositoryError};
use shopfront_api::models::NewProduct;

use super::{MissingDatabaseUrl, database_url};

/// Catalogue used when no file is given.
const SAMPLE_PRODUCTS: &str = include_str!("../../data/sample-products.json");

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Required environment variable is missing.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    /// The input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The input is not a JSON array of products.
    #[error("Invalid product data: {0}")]
    Parse(#[from] serde_json::Error),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome counts for a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub invalid: usize,
}

/// Parse a JSON product array.
fn parse_products(content: &str) -> Result<Vec<NewProduct>, serde_json::Error> {
    serde_json::from_str(content)
}

/// Seed products from `file`, or the bundled sample catalogue.
///
/// # Errors
///
/// Returns an error if the file is unreadable or malformed, or the database
/// is unreachable. Individual invalid products are logged and skipped.
pub async fn products(file: Option<&Path>) -> Result<SeedSummary, SeedError> {
    let products = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading products from file");
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SeedError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            parse_products(&content)?
        }
        None => {
            info!("Loading bundled sample products");
            parse_products(SAMPLE_PRODUCTS)?
        }
    };
    info!(count = products.len(), "Parsed products");

    let url = database_url()?;
    let pool = db::create_pool(&url).await?;
    let repo = ProductRepository::new(&pool);

    let mut summary = SeedSummary::default();
    for mut product in products {
        let slug = match product.normalize() {
            Ok(slug) => slug,
            Err(reason) => {
                warn!(name = %product.name, %reason, "Skipping invalid product");
                summary.invalid += 1;
                continue;
            }
        };

        if repo.slug_exists(&slug).await? {
            summary.skipped += 1;
            continue;
        }

        let created = repo.create(&product, &slug).await?;
        info!(product_id = %created.id, slug = %created.slug, "Inserted product");
        summary.inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Inserted: {}", summary.inserted);
    info!("  Skipped (slug exists): {}", summary.skipped);
    if summary.invalid > 0 {
        warn!("  Invalid: {}", summary.invalid);
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_catalogue_is_valid() {
        let products = parse_products(SAMPLE_PRODUCTS).unwrap();
        assert!(!products.is_empty());

        for mut product in products {
            let name = product.name.clone();
            assert!(product.normalize().is_ok(), "invalid sample product: {name}");
        }
    }

    #[test]
    fn test_sample_slugs_are_unique() {
        let mut slugs: Vec<String> = parse_products(SAMPLE_PRODUCTS)
            .unwrap()
            .into_iter()
            .map(|mut p| p.normalize().unwrap().as_str().to_owned())
            .collect();
        let total = slugs.len();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), total);
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_products(r#"{"name": "Lamp"}"#).is_err());
    }
}
