//! Stripe Webhook Handling
//!
//! Redundant intake path for checkout completion: the processor notifies
//! us even when the buyer never returns to the success URL. The handler
//! re-runs the same finalizer the client-triggered path uses, so delivery
//! retries are harmless.

use std::sync::Arc;

use stripe::{Event, EventObject, EventType, Webhook};

use crate::error::{PaymentError, Result};
use crate::finalize::CheckoutFinalizer;
use crate::metadata::{META_COURSE_ID, META_UID};

/// Parsed webhook event
#[derive(Clone, Debug)]
pub enum MarketEvent {
    /// Checkout completed - finalize and grant access
    CheckoutCompleted {
        session_id: String,
        uid: Option<String>,
        course_id: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook processor
pub struct WebhookProcessor {
    finalizer: Arc<CheckoutFinalizer>,
}

impl WebhookProcessor {
    pub fn new(finalizer: Arc<CheckoutFinalizer>) -> Self {
        Self { finalizer }
    }

    /// Verify webhook signature and parse the event
    pub fn parse_event(&self, payload: &str, signature: &str, secret: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, secret)
            .map_err(|err| PaymentError::WebhookSignature(err.to_string()))
    }

    /// Process a webhook event.
    ///
    /// Errors propagate so the processor retries delivery; the finalizer is
    /// idempotent, so redelivery after a partial failure is safe.
    pub async fn handle(&self, event: Event) -> Result<MarketEvent> {
        tracing::info!(event_type = ?event.type_, "processing Stripe webhook");

        match event.type_ {
            EventType::CheckoutSessionCompleted => {
                let EventObject::CheckoutSession(session) = &event.data.object else {
                    return Err(PaymentError::InvalidSession(
                        "malformed checkout session payload".into(),
                    ));
                };

                let uid = session
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(META_UID))
                    .cloned();
                let course_id = session
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(META_COURSE_ID))
                    .cloned();

                match &uid {
                    Some(uid) => {
                        let outcome = self.finalizer.finalize(uid, session.id.as_str()).await?;
                        tracing::info!(
                            session = %session.id,
                            course = %outcome.course_id,
                            "webhook finalized checkout"
                        );
                    }
                    None => {
                        tracing::warn!(
                            session = %session.id,
                            "completed session carries no buyer metadata; skipping"
                        );
                    }
                }

                Ok(MarketEvent::CheckoutCompleted {
                    session_id: session.id.to_string(),
                    uid,
                    course_id,
                })
            }

            _ => Ok(MarketEvent::Other {
                event_type: format!("{:?}", event.type_),
            }),
        }
    }
}
