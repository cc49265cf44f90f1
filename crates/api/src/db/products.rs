//! Product catalogue queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use shopfront_core::{ProductId, Slug};

use super::{RepositoryError, conflict_on_unique};
use crate::models::product::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, NewProduct, Product};

const SLUG_CONFLICT: &str = "A product with this name already exists";

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, sale_price, \
    category, brand, images, stock, rating, num_reviews, features, specifications, \
    is_active, is_on_sale, is_new, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    sale_price: Option<Decimal>,
    category: String,
    brand: Option<String>,
    images: Vec<String>,
    stock: i32,
    rating: Decimal,
    num_reviews: i32,
    features: Vec<String>,
    specifications: Json<BTreeMap<String, String>>,
    is_active: bool,
    is_on_sale: bool,
    is_new: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            price: r.price,
            sale_price: r.sale_price,
            category: r.category,
            brand: r.brand,
            images: r.images,
            stock: r.stock,
            rating: r.rating,
            num_reviews: r.num_reviews,
            features: r.features,
            specifications: r.specifications.0,
            is_active: r.is_active,
            is_on_sale: r.is_on_sale,
            is_new: r.is_new,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Listing filters, already clamped to valid ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive substring of name, description or category.
    pub keyword: Option<String>,
    /// Case-insensitive exact category.
    pub category: Option<String>,
    /// 1-based page number.
    pub page: i64,
    /// Page size.
    pub limit: i64,
}

impl ProductFilter {
    /// Build a filter from raw query values, dropping blanks and clamping
    /// `page` to at least 1 and `limit` to `1..=100`.
    #[must_use]
    pub fn new(
        keyword: Option<&str>,
        category: Option<&str>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Self {
        let non_blank = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };

        Self {
            keyword: non_blank(keyword),
            category: non_blank(category),
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Row offset for the requested page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ILIKE` pattern for the keyword with wildcards escaped.
    #[must_use]
    pub fn keyword_pattern(&self) -> Option<String> {
        self.keyword.as_ref().map(|k| {
            let escaped = k
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products matching `filter`, newest first, with the total
    /// number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<(Vec<Product>, i64), RepositoryError> {
        const WHERE: &str = r"
            WHERE is_active
              AND ($1::text IS NULL
                   OR name ILIKE $1 OR description ILIKE $1 OR category ILIKE $1)
              AND ($2::text IS NULL OR lower(category) = lower($2))
        ";

        let pattern = filter.keyword_pattern();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM shop.product {WHERE}"))
            .bind(&pattern)
            .bind(&filter.category)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product {WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(&pattern)
        .bind(&filter.category)
        .bind(filter.limit)
        .bind(filter.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get an active product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_by_id(id).await?.filter(|p| p.is_active))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Whether a product with this slug exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn slug_exists(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shop.product WHERE slug = $1)")
                .bind(slug.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Distinct categories of active products, sorted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM shop.product WHERE is_active ORDER BY category",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Insert a validated product under `slug`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewProduct, slug: &Slug) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product (
                name, slug, description, price, sale_price, category, brand, images,
                stock, features, specifications, is_active, is_on_sale, is_new
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&new.name)
        .bind(slug.as_str())
        .bind(&new.description)
        .bind(new.price)
        .bind(new.sale_price)
        .bind(&new.category)
        .bind(&new.brand)
        .bind(&new.images)
        .bind(new.stock)
        .bind(&new.features)
        .bind(Json(&new.specifications))
        .bind(new.is_active)
        .bind(new.is_on_sale)
        .bind(new.is_new)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique(SLUG_CONFLICT))?;

        Ok(Product::from(row))
    }

    /// Persist every editable field of `product`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product no longer exists.
    /// Returns `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product
            SET name = $2, slug = $3, description = $4, price = $5, sale_price = $6,
                category = $7, brand = $8, images = $9, stock = $10, features = $11,
                specifications = $12, is_active = $13, is_on_sale = $14, is_new = $15
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.images)
        .bind(product.stock)
        .bind(&product.features)
        .bind(Json(&product.specifications))
        .bind(product.is_active)
        .bind(product.is_on_sale)
        .bind(product.is_new)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique(SLUG_CONFLICT))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(Product::from(row))
    }

    /// Delete a product. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count of all products, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.product")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Products with `stock <= threshold`, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product
             WHERE stock <= $1
             ORDER BY stock, name"
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter = ProductFilter::new(None, Some("  "), None, None);
        assert_eq!(filter.keyword, None);
        assert_eq!(filter.category, None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(filter.offset(), 0);
    }

    #[test]
    fn test_filter_clamps() {
        let filter = ProductFilter::new(Some(" shirt "), Some("Tops"), Some(0), Some(500));
        assert_eq!(filter.keyword.as_deref(), Some("shirt"));
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, MAX_PAGE_SIZE);

        let filter = ProductFilter::new(None, None, Some(3), Some(-5));
        assert_eq!(filter.limit, 1);
        assert_eq!(filter.offset(), 2);
    }

    #[test]
    fn test_keyword_pattern_escapes_wildcards() {
        let filter = ProductFilter::new(Some("100%_cotton"), None, None, None);
        assert_eq!(filter.keyword_pattern().as_deref(), Some("%100\\%\\_cotton%"));
    }
}
