//! Shopfront REST API.
//!
//! Exposed as a library so the router can be driven in tests and the CLI
//! can reuse the repositories.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::router;
pub use state::AppState;
