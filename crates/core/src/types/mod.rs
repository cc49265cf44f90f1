//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod rating;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{OrderTotals, PriceError, round_money, to_minor_units};
pub use rating::{RatingError, average_rating, validate_rating};
pub use slug::{Slug, SlugError};
pub use status::*;
