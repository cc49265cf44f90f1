//! Catalogue types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{ProductId, Slug};

/// Default page size for product listings.
pub const DEFAULT_PAGE_SIZE: i64 = 12;
/// Largest page size a client may ask for.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A product as shown to shoppers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub category: String,
    pub brand: Option<String>,
    pub images: Vec<String>,
    pub stock: i32,
    pub rating: Decimal,
    pub num_reviews: i32,
    pub features: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub is_active: bool,
    pub is_on_sale: bool,
    pub is_new: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price a shopper pays right now.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        match self.sale_price {
            Some(sale) if self.is_on_sale => sale,
            _ => self.price,
        }
    }
}

/// One page of a product listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: i64,
    pub pages: i64,
    pub total: i64,
}

impl ProductPage {
    /// Number of pages needed for `total` items at `limit` per page.
    #[must_use]
    pub const fn page_count(total: i64, limit: i64) -> i64 {
        if total <= 0 || limit <= 0 {
            0
        } else {
            (total + limit - 1) / limit
        }
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    pub category: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_on_sale: bool,
    #[serde(default)]
    pub is_new: bool,
}

const fn default_true() -> bool {
    true
}

impl NewProduct {
    /// Trim text fields and check value ranges, returning the slug to store.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn normalize(&mut self) -> Result<Slug, String> {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_string();
        self.brand = self
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(ToString::to_string);

        if self.name.is_empty() {
            return Err("Product name is required".to_string());
        }
        if self.description.is_empty() {
            return Err("Product description is required".to_string());
        }
        if self.category.is_empty() {
            return Err("Product category is required".to_string());
        }
        check_prices(self.price, self.sale_price)?;
        check_stock(self.stock)?;

        Slug::from_title(&self.name).map_err(|_| "Product name must contain letters or digits".to_string())
    }
}

/// Partial product update; absent fields are left unchanged.
///
/// `salePrice: null` clears the sale price, which an absent field cannot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "present")]
    pub sale_price: Option<Option<Decimal>>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub features: Option<Vec<String>>,
    pub specifications: Option<BTreeMap<String, String>>,
    pub is_active: Option<bool>,
    pub is_on_sale: Option<bool>,
    pub is_new: Option<bool>,
}

impl ProductUpdate {
    /// Apply this update to `product`, returning a new slug if the name changed.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn apply(self, product: &mut Product) -> Result<Option<Slug>, String> {
        let mut new_slug = None;

        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err("Product name is required".to_string());
            }
            if name != product.name {
                let slug = Slug::from_title(&name)
                    .map_err(|_| "Product name must contain letters or digits".to_string())?;
                if slug.as_str() != product.slug {
                    new_slug = Some(slug);
                }
                product.name = name;
            }
        }
        if let Some(description) = self.description {
            let description = description.trim().to_string();
            if description.is_empty() {
                return Err("Product description is required".to_string());
            }
            product.description = description;
        }
        if let Some(category) = self.category {
            let category = category.trim().to_string();
            if category.is_empty() {
                return Err("Product category is required".to_string());
            }
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(sale_price) = self.sale_price {
            product.sale_price = sale_price;
        }
        check_prices(product.price, product.sale_price)?;
        if let Some(brand) = self.brand {
            let brand = brand.trim();
            product.brand = (!brand.is_empty()).then(|| brand.to_string());
        }
        if let Some(stock) = self.stock {
            check_stock(stock)?;
            product.stock = stock;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(features) = self.features {
            product.features = features;
        }
        if let Some(specifications) = self.specifications {
            product.specifications = specifications;
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        if let Some(is_on_sale) = self.is_on_sale {
            product.is_on_sale = is_on_sale;
        }
        if let Some(is_new) = self.is_new {
            product.is_new = is_new;
        }

        if let Some(slug) = &new_slug {
            product.slug = slug.as_str().to_string();
        }
        Ok(new_slug)
    }
}

/// Mark a field that appeared in the body, even as `null`, as `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn check_prices(price: Decimal, sale_price: Option<Decimal>) -> Result<(), String> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative".to_string());
    }
    if sale_price.is_some_and(|s| s < Decimal::ZERO) {
        return Err("Sale price cannot be negative".to_string());
    }
    Ok(())
}

fn check_stock(stock: i32) -> Result<(), String> {
    if stock < 0 {
        return Err("Stock cannot be negative".to_string());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        serde_json::from_value(serde_json::json!({
            "name": "  Linen Shirt ",
            "description": "Breathable summer shirt",
            "price": "29.90",
            "category": " Shirts "
        }))
        .unwrap()
    }

    fn product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Linen Shirt".to_string(),
            slug: "linen-shirt".to_string(),
            description: "Breathable".to_string(),
            price: Decimal::new(2990, 2),
            sale_price: None,
            category: "Shirts".to_string(),
            brand: None,
            images: vec!["/img/shirt.jpg".to_string()],
            stock: 4,
            rating: Decimal::ZERO,
            num_reviews: 0,
            features: Vec::new(),
            specifications: BTreeMap::new(),
            is_active: true,
            is_on_sale: false,
            is_new: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_product_defaults_and_trim() {
        let mut input = new_product();
        let slug = input.normalize().unwrap();
        assert_eq!(slug.as_str(), "linen-shirt");
        assert_eq!(input.name, "Linen Shirt");
        assert_eq!(input.category, "Shirts");
        assert_eq!(input.stock, 0);
        assert!(input.is_active);
    }

    #[test]
    fn test_new_product_rejects_bad_values() {
        let mut input = new_product();
        input.price = Decimal::new(-1, 0);
        assert_eq!(input.normalize().unwrap_err(), "Price cannot be negative");

        let mut input = new_product();
        input.stock = -3;
        assert_eq!(input.normalize().unwrap_err(), "Stock cannot be negative");

        let mut input = new_product();
        input.category = "   ".to_string();
        assert!(input.normalize().is_err());
    }

    #[test]
    fn test_update_renames_and_reslugs() {
        let mut p = product();
        let update = ProductUpdate {
            name: Some("Linen Shirt (Navy)".to_string()),
            stock: Some(10),
            ..ProductUpdate::default()
        };
        let slug = update.apply(&mut p).unwrap();
        assert_eq!(slug.unwrap().as_str(), "linen-shirt-navy");
        assert_eq!(p.slug, "linen-shirt-navy");
        assert_eq!(p.stock, 10);
    }

    #[test]
    fn test_update_keeps_slug_when_name_unchanged() {
        let mut p = product();
        let update = ProductUpdate {
            price: Some(Decimal::new(1999, 2)),
            ..ProductUpdate::default()
        };
        assert!(update.apply(&mut p).unwrap().is_none());
        assert_eq!(p.price, Decimal::new(1999, 2));
    }

    #[test]
    fn test_update_sale_price_null_clears() {
        let mut p = product();
        p.sale_price = Some(Decimal::new(1990, 2));
        p.is_on_sale = true;

        let keep: ProductUpdate = serde_json::from_str(r#"{"stock":3}"#).unwrap();
        assert_eq!(keep.sale_price, None);
        keep.apply(&mut p).unwrap();
        assert_eq!(p.sale_price, Some(Decimal::new(1990, 2)));

        let clear: ProductUpdate =
            serde_json::from_str(r#"{"salePrice":null,"isOnSale":false}"#).unwrap();
        assert_eq!(clear.sale_price, Some(None));
        clear.apply(&mut p).unwrap();
        assert_eq!(p.sale_price, None);
        assert_eq!(p.effective_price(), Decimal::new(2990, 2));
    }

    #[test]
    fn test_update_sale_price_set() {
        let mut p = product();
        let update: ProductUpdate = serde_json::from_str(r#"{"salePrice":"24.90"}"#).unwrap();
        update.apply(&mut p).unwrap();
        assert_eq!(p.sale_price, Some(Decimal::new(2490, 2)));

        let negative: ProductUpdate = serde_json::from_str(r#"{"salePrice":"-1"}"#).unwrap();
        assert_eq!(
            negative.apply(&mut product()).unwrap_err(),
            "Sale price cannot be negative"
        );
    }

    #[test]
    fn test_effective_price() {
        let mut p = product();
        p.sale_price = Some(Decimal::new(1990, 2));
        assert_eq!(p.effective_price(), Decimal::new(2990, 2));
        p.is_on_sale = true;
        assert_eq!(p.effective_price(), Decimal::new(1990, 2));
    }

    #[test]
    fn test_page_count() {
        assert_eq!(ProductPage::page_count(0, 12), 0);
        assert_eq!(ProductPage::page_count(12, 12), 1);
        assert_eq!(ProductPage::page_count(13, 12), 2);
    }
}
