//! Domain models for the API.
//!
//! These are the validated shapes handlers work with and serialize. Database
//! row types live next to their queries in `crate::db`.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLine, CartProduct};
pub use order::{CustomerInfo, Order, OrderItem};
pub use product::{NewProduct, Product, ProductPage, ProductUpdate};
pub use review::{NewReview, Review, ReviewableItem};
pub use session::{CurrentUser, keys as session_keys};
pub use user::{ProfileUpdate, User};
