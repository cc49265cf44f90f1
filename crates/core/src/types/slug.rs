//! URL slugs for products.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when building a [`Slug`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing slug-worthy was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
}

/// A lowercase, hyphen-separated URL segment (`"linen-shirt-2"`).
///
/// ```
/// use shopfront_core::Slug;
///
/// let slug = Slug::from_title("  Linen Shirt (Blue) ").unwrap();
/// assert_eq!(slug.as_str(), "linen-shirt-blue");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Build a slug from a display title.
    ///
    /// ASCII letters and digits are kept (lowercased); every other run of
    /// characters becomes a single `-`. Leading and trailing hyphens are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if the title has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }
        Ok(Self(out))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
