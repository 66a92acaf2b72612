//! HTTP API Layer
//!
//! REST API over the payment stage engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: payments, replacements, batches, entries, statement lines, catalog
//! - **Middleware**: JWT authentication and audit logging
//! - **DTOs**: Request/Response data transfer objects with validation
//! - **Seed**: ledger and stage catalogs the service starts with
//!
//! The service is held behind an async `RwLock`; every write action takes
//! the write lock, so actions on the same payment never interleave.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{build_state, create_router, config::ApiConfig};
//!
//! let state = build_state(ApiConfig::default())?;
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod seed;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::CoreError;
use domain_payment::{PartnerBlockRegistry, PaymentService};

use crate::config::ApiConfig;
use crate::handlers::{batches, catalog, entries, health, payments, replacements, statements};
use crate::middleware::{audit_middleware, auth_middleware};
use crate::seed::{CatalogSeed, SeedIndex};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RwLock<PaymentService>>,
    pub index: Arc<SeedIndex>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(service: PaymentService, index: SeedIndex, config: ApiConfig) -> Self {
        Self {
            service: Arc::new(RwLock::new(service)),
            index: Arc::new(index),
            config: Arc::new(config),
        }
    }
}

/// Builds the application state from the configured catalog seed
///
/// Installs the in-process partner block registry as the counterparty
/// blocking capability.
pub fn build_state(config: ApiConfig) -> Result<AppState, CoreError> {
    let seed = match &config.catalog_seed {
        Some(path) => CatalogSeed::from_file(path)?,
        None => CatalogSeed::builtin()?,
    };
    let (service, index) = seed.build(config.currency()?, config.engine.clone())?;
    let registry = Arc::new(PartnerBlockRegistry::new(config.engine.counterparty_blocking));
    let service = service.with_blocking(registry);
    Ok(AppState::new(service, index, config))
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let payment_routes = Router::new()
        .route("/", post(payments::create_payment).get(payments::list_payments))
        .route("/:id", get(payments::get_payment))
        .route("/:id/post", post(payments::post_payment))
        .route("/:id/advance", post(payments::advance))
        .route("/:id/butterfly", post(payments::set_butterfly))
        .route("/:id/prior-notice", post(payments::set_prior_notice))
        .route("/:id/unpaid", post(payments::set_unpaid))
        .route("/:id/paid", post(payments::set_paid))
        .route("/:id/draft", post(payments::action_draft))
        .route("/:id/cancel", post(payments::action_cancel))
        .route("/:id/statement-line", post(payments::link_statement_line));

    let replacement_routes = Router::new()
        .route("/", post(replacements::replace).get(replacements::list_links))
        .route("/:payment_id", delete(replacements::unwind));

    let batch_routes = Router::new()
        .route("/", post(batches::create_batch))
        .route("/:id", get(batches::get_batch))
        .route("/:id/reference", put(batches::set_reference))
        .route("/:id/validate", post(batches::validate_batch))
        .route("/:id/switch", post(batches::switch_batch));

    let statement_routes = Router::new()
        .route("/", post(statements::register_line))
        .route("/:id/reconcile", post(statements::mark_reconciled));

    let catalog_routes = Router::new()
        .route("/", get(catalog::get_catalog))
        .route("/:method_id/stages", get(catalog::get_stages));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/payments", payment_routes)
        .nest("/replacements", replacement_routes)
        .nest("/batches", batch_routes)
        .nest("/statement-lines", statement_routes)
        .nest("/catalog", catalog_routes)
        .route("/entries/:id", get(entries::get_entry))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware))
                .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware)),
        );

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}
