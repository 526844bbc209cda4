//! API Module
//!
//! HTTP handlers and routing for the cache sidecar.
//!
//! # Endpoints
//! - `PUT /responses` - Store a JSON response under a key
//! - `GET /responses/:key` - Read a cached response
//! - `DELETE /responses/:key` - Drop a cached response
//! - `POST /dm/send` - Spend DM budget for a user and channel (429 when exhausted)
//! - `GET /dm/limits/:user_id/:channel_id` - Inspect DM budget without spending it
//! - `GET /users/:id` - Cached profile lookup with stale fallback
//! - `DELETE /users/:id` - Invalidate a cached profile
//! - `GET /stats` - Cache, limiter and lookup statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
