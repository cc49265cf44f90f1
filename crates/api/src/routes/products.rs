//! Catalogue routes.
//!
//! Shoppers only ever see active products; the admin-only write routes
//! operate on any product by numeric ID.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use shopfront_core::ProductId;

use crate::db::{ProductFilter, ProductRepository};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductPage, ProductUpdate};
use crate::state::AppState;

const NOT_FOUND: &str = "Product not found";

// =============================================================================
// Query Types
// =============================================================================

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn filter(&self) -> ProductFilter {
        ProductFilter::new(
            self.keyword.as_deref(),
            self.category.as_deref(),
            self.page,
            self.limit,
        )
    }
}

/// How a `/api/products/{idOrSlug}` segment is looked up.
#[derive(Debug, PartialEq, Eq)]
enum ProductRef<'a> {
    Id(ProductId),
    Slug(&'a str),
}

impl<'a> ProductRef<'a> {
    fn parse(segment: &'a str) -> Self {
        segment
            .parse::<i32>()
            .map_or(Self::Slug(segment), |id| Self::Id(ProductId::new(id)))
    }
}

// =============================================================================
// Shopper Routes
// =============================================================================

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<ProductPage>> {
    let filter = query.filter();
    let (products, total) = ProductRepository::new(state.pool()).list(&filter).await?;

    Ok(Json(ProductPage {
        products,
        page: filter.page,
        pages: ProductPage::page_count(total, filter.limit),
        total,
    }))
}

/// `GET /api/products/categories`
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let categories = ProductRepository::new(state.pool()).categories().await?;
    Ok(Json(categories))
}

/// `GET /api/products/{idOrSlug}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id_or_slug): ApiPath<String>,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    let product = match ProductRef::parse(&id_or_slug) {
        ProductRef::Id(id) => products.get_active(id).await?,
        ProductRef::Slug(slug) => products.get_by_slug(slug).await?,
    };

    product
        .map(Json)
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))
}

// =============================================================================
// Admin Routes
// =============================================================================

/// `POST /api/products`
#[instrument(skip(state, admin, new), fields(admin_id = %admin.id, name = %new.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(mut new): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let slug = new.normalize().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .create(&new, &slug)
        .await?;

    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /api/products/{id}`
#[instrument(skip(state, admin, update), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(update): ApiJson<ProductUpdate>,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    let mut product = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.to_string()))?;

    if let Some(slug) = update.apply(&mut product).map_err(AppError::BadRequest)? {
        product.slug = slug.into_inner();
    }

    let product = products.update(&product).await?;
    info!(product_id = %product.id, "Product updated");
    Ok(Json(product))
}

/// `DELETE /api/products/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Value>> {
    if !ProductRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound(NOT_FOUND.to_string()));
    }

    info!(product_id = %id, "Product deleted");
    Ok(Json(json!({ "message": "Product removed" })))
}
