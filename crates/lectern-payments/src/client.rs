//! Stripe Client Wrapper

use stripe::Client;

use crate::error::{PaymentError, Result};

/// Shared Stripe client handle, created once per process
pub struct StripeGateway {
    client: Client,
    webhook_secret: Option<String>,
}

impl StripeGateway {
    /// Create a new gateway
    pub fn new(secret_key: &str, webhook_secret: Option<String>) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok();

        Ok(Self::new(&secret_key, webhook_secret))
    }

    /// Webhook signing secret, if webhook intake is configured
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
