//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{RequireAdmin, RequireAuth, clear_current_user, set_current_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, client_ip};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
