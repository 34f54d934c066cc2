//! Payment Error Types
//!
//! Four-way taxonomy: validation faults, not-found faults, business-state
//! faults, and upstream faults. Upstream failures are never interpreted as
//! business verdicts.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    // --- Validation faults ---
    /// Required request field absent or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Session id malformed or session not usable for this flow
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    // --- Not-found faults ---
    /// No user profile exists for the identifier
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No course exists for the identifier
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    /// User has no payee account on file
    #[error("No payee account on file for user {0}")]
    NoAccountFound(String),

    // --- State faults ---
    /// Course has no creator and cannot be sold
    #[error("Course has no creator: {0}")]
    CourseMisconfigured(String),

    /// Free courses must use the direct-grant path, not checkout
    #[error("Course is free and cannot be purchased: {0}")]
    CourseIsFree(String),

    /// Creator's payout path is incomplete
    #[error("Course creator has not completed payout onboarding")]
    CreatorNotOnboarded,

    /// Price below the sellable minimum
    #[error("Course price of {price} cents is below the {minimum}-cent minimum")]
    PriceTooLow { price: i64, minimum: i64 },

    /// Buyer abandoned or cancelled before paying; not a hard failure
    #[error("Payment not completed for session {0}")]
    PaymentNotCompleted(String),

    /// Session carries no payment object
    #[error("No payment attached to session {0}")]
    MissingPayment(String),

    /// Caller is not the buyer recorded on the session
    #[error("Session does not belong to the caller")]
    IdentityMismatch,

    /// Explicit account id disagrees with the stored profile
    #[error("Account {account} does not belong to user {uid}")]
    AccountMismatch { uid: String, account: String },

    // --- Upstream faults ---
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is a transient upstream failure worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Stripe(_) | PaymentError::Store(_))
    }

    /// Message safe to show a caller. Upstream detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Stripe(_) => "Payment processor error. Please try again.".into(),
            PaymentError::Store(_) => "Storage error. Please try again.".into(),
            PaymentError::Config(_) => "Service configuration error.".into(),
            other => other.to_string(),
        }
    }
}

impl From<stripe::StripeError> for PaymentError {
    fn from(err: stripe::StripeError) -> Self {
        PaymentError::Stripe(err.to_string())
    }
}

impl From<lectern_core::CoreError> for PaymentError {
    fn from(err: lectern_core::CoreError) -> Self {
        use lectern_core::CoreError;
        match err {
            CoreError::UserNotFound(uid) => PaymentError::UserNotFound(uid),
            CoreError::CourseNotFound(id) => PaymentError::CourseNotFound(id),
            other => PaymentError::Store(other.to_string()),
        }
    }
}
