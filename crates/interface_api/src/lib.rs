//! HTTP API Layer
//!
//! This crate provides the REST API for the student billing ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for each billing resource
//! - **Middleware**: Request ids, tracing and request logging
//! - **DTOs**: Request bodies and query strings
//! - **Error Handling**: Consistent error responses
//!
//! Amounts are JSON strings with two fractional digits; dates are ISO 8601.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(store, clock, config);
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use core_kernel::Clock;
use domain_billing::{BillingContext, BillingServices, BillingStore};

use crate::config::ApiConfig;
use crate::handlers::{fee_structures, financial_aid, health, invoices, payments, refunds, students};
use crate::middleware::{request_logging, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub billing: BillingServices,
    pub store: Arc<dyn BillingStore>,
    pub clock: Arc<dyn Clock>,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires the billing services over a store and clock
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>, config: ApiConfig) -> Self {
        let ctx = BillingContext::new(store.clone(), clock.clone(), config.billing_settings());
        Self {
            billing: BillingServices::new(ctx),
            store,
            clock,
            config,
        }
    }
}

/// Creates the main API router
///
/// Health checks are served at the root; everything else under `/api/v1`.
pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let fee_routes = Router::new()
        .route(
            "/",
            post(fee_structures::save_fee_structure).get(fee_structures::list_fee_structures),
        )
        .route("/lookup", get(fee_structures::lookup_fee_structure))
        .route(
            "/:id",
            get(fee_structures::get_fee_structure).delete(fee_structures::delete_fee_structure),
        );

    let invoice_routes = Router::new()
        .route("/", post(invoices::generate_invoice).get(invoices::list_invoices))
        .route("/calculate", post(invoices::calculate_tuition))
        .route("/late-fees", post(invoices::apply_late_fees))
        .route("/number/:number", get(invoices::get_invoice_by_number))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/late-fee", post(invoices::apply_late_fee))
        .route("/:id/cancel", post(invoices::cancel_invoice));

    let payment_routes = Router::new()
        .route("/", post(payments::record_payment).get(payments::list_payments))
        .route("/reference/:reference", get(payments::get_payment_by_reference))
        .route("/:id", get(payments::get_payment))
        .route("/:id/reverse", post(payments::reverse_payment));

    let aid_routes = Router::new()
        .route("/", post(financial_aid::create_aid).get(financial_aid::list_aid))
        .route("/apply", post(financial_aid::apply_aid))
        .route("/allocate", post(financial_aid::allocate_aid))
        .route("/:id", get(financial_aid::get_aid))
        .route("/:id/revoke", post(financial_aid::revoke_aid));

    let refund_routes = Router::new()
        .route("/", post(refunds::process_refund))
        .route("/:id", get(refunds::get_refund))
        .route("/:id/approve", post(refunds::approve_refund))
        .route("/:id/complete", post(refunds::complete_refund))
        .route("/:id/reject", post(refunds::reject_refund))
        .route("/:id/cancel", post(refunds::cancel_refund));

    let student_routes = Router::new()
        .route("/:student_id/ledger", get(students::get_ledger))
        .route("/:student_id/tax-statement/:year", get(students::get_tax_statement))
        .route("/:student_id/balance", get(students::get_balance))
        .route("/:student_id/credit-balance", get(students::get_credit_balance))
        .route("/:student_id/refunds", get(students::list_refunds));

    let api_routes = Router::new()
        .nest("/fee-structures", fee_routes)
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .nest("/financial-aid", aid_routes)
        .nest("/refunds", refund_routes)
        .nest("/students", student_routes)
        .layer(axum_middleware::from_fn(request_logging));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
