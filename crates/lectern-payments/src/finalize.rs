//! Checkout Finalizer
//!
//! Reconciles a completed checkout against the processor's record and
//! grants content access. The processor is the source of truth: nothing
//! from the client beyond the session id is trusted.
//!
//! Two phases with a documented ordering: phase 1 (validate payment, grant
//! access) must succeed or the whole operation fails; phase 2 (fee
//! extraction for reporting) may fail independently and only affects how
//! much the response can say, never whether access was granted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stripe::{
    BalanceTransaction, Charge, CheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    Expandable, PaymentIntent, PaymentIntentStatus,
};

use lectern_core::{AccessControl, MarketStore};

use crate::checkout::{platform_fee, price_to_minor_units};
use crate::client::StripeGateway;
use crate::config::PlatformConfig;
use crate::error::{PaymentError, Result};
use crate::metadata::RecoveredContext;

/// Confirmation returned after a successful finalize
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub course_id: String,

    /// Processor customer identifier, for receipts/analytics
    pub customer_id: Option<String>,

    /// Platform commission actually recorded on the payment
    pub application_fee_cents: Option<i64>,

    /// The processor's own cut, from the settlement record. Best-effort.
    pub processing_fee_cents: Option<i64>,
}

/// Checkout finalizer
pub struct CheckoutFinalizer {
    gateway: Arc<StripeGateway>,
    store: Arc<dyn MarketStore>,
    access: AccessControl,
    config: Arc<PlatformConfig>,
}

impl CheckoutFinalizer {
    pub fn new(
        gateway: Arc<StripeGateway>,
        store: Arc<dyn MarketStore>,
        config: Arc<PlatformConfig>,
    ) -> Self {
        let access = AccessControl::new(store.clone());
        Self {
            gateway,
            store,
            access,
            config,
        }
    }

    /// Finalize a completed checkout for the calling buyer.
    ///
    /// Safe to call repeatedly with the same session id: the underlying
    /// purchase grant is a merge, so retries and races converge on the
    /// same record.
    pub async fn finalize(&self, caller_uid: &str, session_id: &str) -> Result<FinalizeOutcome> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::InvalidSession(format!("malformed session id: {session_id}")))?;

        let session = CheckoutSession::retrieve(
            self.gateway.inner(),
            &id,
            &[
                "payment_intent",
                "payment_intent.latest_charge.balance_transaction",
            ],
        )
        .await?;

        if session.mode != CheckoutSessionMode::Payment {
            return Err(PaymentError::InvalidSession(
                "session is not a one-time payment".into(),
            ));
        }

        let intent = match &session.payment_intent {
            Some(Expandable::Object(intent)) => (**intent).clone(),
            Some(Expandable::Id(intent_id)) => {
                PaymentIntent::retrieve(
                    self.gateway.inner(),
                    intent_id,
                    &["latest_charge.balance_transaction"],
                )
                .await?
            }
            None => return Err(PaymentError::MissingPayment(session_id.to_string())),
        };

        if intent.status != PaymentIntentStatus::Succeeded {
            return Err(PaymentError::PaymentNotCompleted(session_id.to_string()));
        }

        let context =
            RecoveredContext::from_metadata(session.metadata.as_ref(), Some(&intent.metadata))?;

        // One user must not finalize another's session.
        if context.uid != caller_uid {
            tracing::warn!(
                session = session_id,
                caller = caller_uid,
                "finalize attempted by a caller other than the session's buyer"
            );
            return Err(PaymentError::IdentityMismatch);
        }

        self.integrity_check(&context, &session, &intent).await;

        // Phase 1 commit: the grant happens before any fee enrichment.
        self.access
            .grant_purchase(&context.uid, &context.course_id)
            .await
            .map_err(|err| PaymentError::Store(err.to_string()))?;

        // Phase 2: reporting fields, best-effort.
        let application_fee_cents = intent.application_fee_amount;
        let processing_fee_cents = match self.processing_fee(&intent).await {
            Ok(fee) => fee,
            Err(err) => {
                tracing::warn!(
                    session = session_id,
                    error = %err,
                    "processing fee lookup failed; access already granted"
                );
                None
            }
        };

        let customer_id = session.customer.as_ref().map(|c| c.id().to_string());

        tracing::info!(
            buyer = %context.uid,
            course = %context.course_id,
            session = session_id,
            application_fee = ?application_fee_cents,
            processing_fee = ?processing_fee_cents,
            "finalized checkout"
        );

        Ok(FinalizeOutcome {
            course_id: context.course_id,
            customer_id,
            application_fee_cents,
            processing_fee_cents,
        })
    }

    /// Recompute the expected total from current course state and compare
    /// against what the processor recorded. Logged only: the price may have
    /// legitimately changed since the session was created, and the
    /// processor's amount is authoritative for what was charged.
    async fn integrity_check(
        &self,
        context: &RecoveredContext,
        session: &CheckoutSession,
        intent: &PaymentIntent,
    ) {
        let Ok(Some(course)) = self.store.get_course(&context.course_id).await else {
            return;
        };
        let base = price_to_minor_units(course.price);
        let expected = base + platform_fee(base, self.config.fee_percent);
        let charged = session.amount_total.unwrap_or(intent.amount);
        if expected != charged {
            tracing::warn!(
                course = %context.course_id,
                expected,
                charged,
                metadata_base = ?context.base_amount,
                metadata_fee = ?context.platform_fee,
                "charged total differs from current course pricing"
            );
        }
    }

    /// Walk payment -> latest charge -> balance transaction -> fee,
    /// resolving processor references with an extra fetch where the object
    /// was not inlined by expansion.
    async fn processing_fee(&self, intent: &PaymentIntent) -> Result<Option<i64>> {
        let Some(charge_ref) = &intent.latest_charge else {
            return Ok(None);
        };
        let charge = self.resolve_charge(charge_ref).await?;

        let Some(txn_ref) = &charge.balance_transaction else {
            return Ok(None);
        };
        let txn = self.resolve_balance_transaction(txn_ref).await?;

        Ok(Some(txn.fee))
    }

    async fn resolve_charge(&self, charge: &Expandable<Charge>) -> Result<Charge> {
        match charge {
            Expandable::Object(charge) => Ok((**charge).clone()),
            Expandable::Id(id) => {
                Ok(Charge::retrieve(self.gateway.inner(), id, &["balance_transaction"]).await?)
            }
        }
    }

    async fn resolve_balance_transaction(
        &self,
        txn: &Expandable<BalanceTransaction>,
    ) -> Result<BalanceTransaction> {
        match txn {
            Expandable::Object(txn) => Ok((**txn).clone()),
            Expandable::Id(id) => {
                Ok(BalanceTransaction::retrieve(self.gateway.inner(), id, &[]).await?)
            }
        }
    }
}
