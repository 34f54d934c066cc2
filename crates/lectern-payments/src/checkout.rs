//! Checkout Session Builder
//!
//! Validates the course and its creator's payout state, computes the
//! platform fee split, and creates the hosted checkout session. No local
//! state is mutated here: until finalize, every side effect lives at the
//! processor.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession, CheckoutSessionMode, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentIntentData, CreateCheckoutSessionPaymentIntentDataTransferData,
    RequestStrategy,
};

use lectern_core::MarketStore;

use crate::client::StripeGateway;
use crate::config::PlatformConfig;
use crate::error::{PaymentError, Result};
use crate::metadata::SessionContext;
use crate::origin::build_url;

/// Convert a major-unit price to integer minor units, rounding half-up.
///
/// The finalizer's integrity check re-derives amounts with this same
/// helper; the rounding rule must not drift between the two.
pub fn price_to_minor_units(price: Decimal) -> i64 {
    (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Platform commission on a minor-unit amount, same rounding rule
pub fn platform_fee(base_amount: i64, fee_percent: Decimal) -> i64 {
    (Decimal::from(base_amount) * fee_percent)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutQuote {
    /// Processor session identifier
    pub id: String,

    /// Hosted checkout URL to redirect the buyer to
    pub url: String,

    /// Course price in minor units
    pub base_amount: i64,

    /// Platform commission in minor units
    pub platform_fee: i64,

    /// What the buyer pays: base amount plus platform fee
    pub total_amount: i64,
}

/// Checkout session builder
pub struct CheckoutBuilder {
    gateway: Arc<StripeGateway>,
    store: Arc<dyn MarketStore>,
    config: Arc<PlatformConfig>,
}

impl CheckoutBuilder {
    pub fn new(
        gateway: Arc<StripeGateway>,
        store: Arc<dyn MarketStore>,
        config: Arc<PlatformConfig>,
    ) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    /// Validate the purchase and create a hosted checkout session split
    /// between the course price and the platform's service fee.
    pub async fn start_checkout(
        &self,
        buyer_uid: &str,
        course_id: &str,
        origin: &str,
    ) -> Result<CheckoutQuote> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| PaymentError::CourseNotFound(course_id.to_string()))?;

        let creator_uid = course
            .creator_uid
            .clone()
            .ok_or_else(|| PaymentError::CourseMisconfigured(course_id.to_string()))?;

        if course.is_free || course.effective_price() <= Decimal::ZERO {
            return Err(PaymentError::CourseIsFree(course_id.to_string()));
        }

        let creator = self
            .store
            .get_user(&creator_uid)
            .await?
            .ok_or_else(|| PaymentError::UserNotFound(creator_uid.clone()))?;

        // A course cannot be sold while its creator's payout path is
        // incomplete.
        let payee_account = creator
            .stripe_account_id
            .clone()
            .filter(|_| creator.stripe_onboarded)
            .ok_or(PaymentError::CreatorNotOnboarded)?;

        let base_amount = price_to_minor_units(course.price);
        if base_amount < self.config.min_price_cents {
            return Err(PaymentError::PriceTooLow {
                price: base_amount,
                minimum: self.config.min_price_cents,
            });
        }
        let fee = platform_fee(base_amount, self.config.fee_percent);

        let context = SessionContext {
            uid: buyer_uid.to_string(),
            course_id: course_id.to_string(),
            creator_uid: creator_uid.clone(),
            base_amount,
            platform_fee: fee,
            currency: self.config.currency.to_string(),
        };
        let metadata = context.to_metadata();

        // The processor substitutes the session id into the placeholder on
        // redirect.
        let success_url = build_url(
            origin,
            &format!("courses/{course_id}?session_id={{CHECKOUT_SESSION_ID}}"),
        );
        let cancel_url = build_url(origin, "/");

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.client_reference_id = Some(buyer_uid);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);
        params.metadata = Some(metadata.clone());
        params.line_items = Some(vec![
            CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: self.config.currency,
                    unit_amount: Some(base_amount),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: course.title.clone(),
                        description: (!course.description.is_empty())
                            .then(|| course.description.clone()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            CreateCheckoutSessionLineItems {
                quantity: Some(1),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: self.config.currency,
                    unit_amount: Some(fee),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: "Service fee".into(),
                        description: Some("Platform service fee".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]);
        // The payment carries its own copy of the context and the transfer
        // instructions for the creator's account.
        params.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            application_fee_amount: Some(fee),
            metadata: Some(metadata),
            transfer_data: Some(CreateCheckoutSessionPaymentIntentDataTransferData {
                amount: None,
                destination: payee_account,
            }),
            ..Default::default()
        });

        let client = self
            .gateway
            .inner()
            .clone()
            .with_strategy(RequestStrategy::Idempotent(
                uuid::Uuid::new_v4().to_string(),
            ));
        let session = CheckoutSession::create(&client, params).await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("no checkout URL returned".into()))?;

        tracing::info!(
            buyer = buyer_uid,
            course = course_id,
            base_amount,
            fee,
            session = %session.id,
            "created checkout session"
        );

        Ok(CheckoutQuote {
            id: session.id.to_string(),
            url,
            base_amount,
            platform_fee: fee,
            total_amount: base_amount + fee,
        })
    }
}
