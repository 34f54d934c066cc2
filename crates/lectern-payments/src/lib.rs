//! # lectern-payments
//!
//! Stripe Connect integration for the lectern course marketplace.
//!
//! ## Money flow
//!
//! Buyers pay through Stripe's hosted checkout; the platform keeps a 30%
//! commission and the rest transfers to the course creator's connected
//! Express account:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │   Buyer     │────▶│  Stripe Hosted  │────▶│  Finalize +      │
//! │  (course)   │     │  Checkout Page  │     │  access grant    │
//! └─────────────┘     └─────────────────┘     └──────────────────┘
//!                             │
//!                             ▼
//!              course price ──▶ creator's account
//!              service fee  ──▶ platform
//! ```
//!
//! The finalizer never trusts amounts from the client: it re-fetches the
//! session and its payment from Stripe by id and reconciles from there.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lectern_payments::{CheckoutBuilder, PlatformConfig, StripeGateway};
//!
//! let gateway = Arc::new(StripeGateway::from_env()?);
//! let builder = CheckoutBuilder::new(gateway, store, Arc::new(PlatformConfig::from_env()));
//!
//! let quote = builder.start_checkout("uid", "course-id", "https://origin.example").await?;
//! // Redirect buyer to: quote.url
//! ```

mod checkout;
mod client;
mod config;
mod connect;
mod error;
mod finalize;
mod metadata;
mod onboarding;
mod origin;
mod webhook;

pub use checkout::{platform_fee, price_to_minor_units, CheckoutBuilder, CheckoutQuote};
pub use client::StripeGateway;
pub use config::PlatformConfig;
pub use connect::{OnboardingLink, PayeeAccounts};
pub use error::{PaymentError, Result};
pub use finalize::{CheckoutFinalizer, FinalizeOutcome};
pub use metadata::{RecoveredContext, SessionContext};
pub use onboarding::{derive_onboarded, OnboardingStatus, OnboardingVerdict};
pub use origin::{build_url, normalize_origin};
pub use webhook::{MarketEvent, WebhookProcessor};
