//! Syncline API - Catalog Sync Gateway
//!
//! HTTP layer of the Syncline gateway (Axum). Exposes the incremental
//! change feed, cached single-entity lookups with weak-ETag revalidation,
//! and catalog search, all behind admission control (fixed-window rate
//! limiting) and a resilience stack (retry, timeout race, circuit breaker)
//! around the catalog collaborator.

pub mod catalog;
pub mod conditional;
pub mod config;
pub mod error;
pub mod fetch;
pub mod macros;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogError, CatalogResult, CatalogSource, InMemoryCatalog};
pub use conditional::{conditional_json, if_none_match_satisfied};
pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use fetch::guarded_fetch;
pub use middleware::{rate_limit_middleware, request_id_middleware, REQUEST_ID_HEADER};
pub use routes::GatewayRouterBuilder;
pub use state::AppState;
pub use types::{EntityResponse, SearchResponse, UpdatesResponse};
