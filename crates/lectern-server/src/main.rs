//! lectern HTTP Server
//!
//! Axum-based JSON API for the course marketplace payments flow: payee
//! onboarding, split-payment checkout, finalization, and the access grants
//! that hang off them.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectern_core::{AccessControl, FirestoreStore, MarketStore, MemoryStore};
use lectern_payments::{
    CheckoutBuilder, CheckoutFinalizer, OnboardingStatus, PayeeAccounts, PlatformConfig,
    StripeGateway, WebhookProcessor,
};

use crate::handlers::{
    check_onboarding_status, create_login_link, create_onboarding_link, create_payee_account,
    finalize_checkout, free_enroll, health_check, record_progress, start_checkout, stripe_webhook,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Document store: Firestore in production, memory for local work
    let store: Arc<dyn MarketStore> = match std::env::var("MARKET_STORE").as_deref() {
        Ok("firestore") => Arc::new(FirestoreStore::from_env()?),
        _ => {
            tracing::warn!("⚠ MARKET_STORE not set to 'firestore' - using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    if store.health_check().await {
        tracing::info!("✓ Connected to {} store", store.name());
    } else {
        tracing::warn!("⚠ {} store not reachable", store.name());
    }

    // Stripe is not optional here: every flow this service owns goes
    // through the processor.
    let gateway = Arc::new(StripeGateway::from_env()?);
    if gateway.webhook_secret().is_some() {
        tracing::info!("✓ Stripe configured (webhook intake enabled)");
    } else {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - webhook intake disabled");
    }

    let config = Arc::new(PlatformConfig::from_env());
    tracing::info!(base_url = %config.base_url, "platform configuration loaded");

    // Build application state
    let finalizer = Arc::new(CheckoutFinalizer::new(
        gateway.clone(),
        store.clone(),
        config.clone(),
    ));
    let state = AppState {
        payees: Arc::new(PayeeAccounts::new(
            gateway.clone(),
            store.clone(),
            config.clone(),
        )),
        onboarding: Arc::new(OnboardingStatus::new(gateway.clone(), store.clone())),
        checkout: Arc::new(CheckoutBuilder::new(
            gateway.clone(),
            store.clone(),
            config.clone(),
        )),
        webhooks: Arc::new(WebhookProcessor::new(finalizer.clone())),
        finalizer,
        access: Arc::new(AccessControl::new(store.clone())),
        store,
        gateway,
        config,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health
        .route("/health", get(health_check))
        // Payee onboarding
        .route("/api/connect/account", post(create_payee_account))
        .route("/api/connect/onboarding-link", post(create_onboarding_link))
        .route("/api/connect/login-link", post(create_login_link))
        .route("/api/connect/status", post(check_onboarding_status))
        // Checkout
        .route("/api/checkout", post(start_checkout))
        .route("/api/checkout/finalize", post(finalize_checkout))
        // Access
        .route("/api/courses/free-enroll", post(free_enroll))
        .route("/api/progress", post(record_progress))
        // Webhooks
        .route("/webhook/stripe", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("lectern server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  POST /api/connect/account         - Create payee account");
    tracing::info!("  POST /api/connect/onboarding-link - Onboarding link");
    tracing::info!("  POST /api/connect/login-link      - Dashboard login link");
    tracing::info!("  POST /api/connect/status          - Onboarding status");
    tracing::info!("  POST /api/checkout                - Start checkout");
    tracing::info!("  POST /api/checkout/finalize       - Finalize checkout");
    tracing::info!("  POST /api/courses/free-enroll     - Free course grant");
    tracing::info!("  POST /api/progress                - Lesson progress");
    tracing::info!("  POST /webhook/stripe              - Stripe webhooks");

    axum::serve(listener, app).await?;

    Ok(())
}
