//! Application State

use std::sync::Arc;

use lectern_core::{AccessControl, MarketStore};
use lectern_payments::{
    CheckoutBuilder, CheckoutFinalizer, OnboardingStatus, PayeeAccounts, PlatformConfig,
    StripeGateway, WebhookProcessor,
};

/// Shared application state, built once in `main`
#[derive(Clone)]
pub struct AppState {
    /// Document store handle
    pub store: Arc<dyn MarketStore>,

    /// Payee account manager
    pub payees: Arc<PayeeAccounts>,

    /// Onboarding status checker
    pub onboarding: Arc<OnboardingStatus>,

    /// Checkout session builder
    pub checkout: Arc<CheckoutBuilder>,

    /// Checkout finalizer
    pub finalizer: Arc<CheckoutFinalizer>,

    /// Webhook processor
    pub webhooks: Arc<WebhookProcessor>,

    /// Access grants for the non-payment paths
    pub access: Arc<AccessControl>,

    /// Stripe client handle
    pub gateway: Arc<StripeGateway>,

    /// Platform settings
    pub config: Arc<PlatformConfig>,
}
