//! Onboarding Status
//!
//! Derives the single "fully onboarded" verdict from a payee account's
//! capability flags and requirement lists. A processor lookup failure is a
//! retryable upstream error, never a false verdict.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stripe::Account;

use lectern_core::MarketStore;

use crate::client::StripeGateway;
use crate::connect::{parse_account_id, resolve_account_id};
use crate::error::Result;

/// The derived onboarding verdict for an account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnboardingVerdict {
    pub account_id: String,
    pub onboarded: bool,
}

/// Pure five-condition derivation. All conditions must hold:
/// details submitted, no current requirements, no upcoming requirements,
/// charges enabled, payouts enabled, and the account not disabled.
pub fn derive_onboarded(account: &Account) -> bool {
    let details_submitted = account.details_submitted.unwrap_or(false);
    let charges_enabled = account.charges_enabled.unwrap_or(false);
    let payouts_enabled = account.payouts_enabled.unwrap_or(false);

    let (currently_due_empty, not_disabled) = account.requirements.as_ref().map_or(
        (true, true),
        |req| {
            (
                req.currently_due.as_ref().is_none_or(Vec::is_empty),
                req.disabled_reason.is_none(),
            )
        },
    );

    let future_due_empty = account
        .future_requirements
        .as_ref()
        .and_then(|req| req.currently_due.as_ref())
        .is_none_or(Vec::is_empty);

    details_submitted
        && currently_due_empty
        && future_due_empty
        && charges_enabled
        && payouts_enabled
        && not_disabled
}

/// Onboarding status checker
pub struct OnboardingStatus {
    gateway: Arc<StripeGateway>,
    store: Arc<dyn MarketStore>,
}

impl OnboardingStatus {
    pub fn new(gateway: Arc<StripeGateway>, store: Arc<dyn MarketStore>) -> Self {
        Self { gateway, store }
    }

    /// Fetch the account and derive the verdict. When the checked account
    /// is the one stored on the caller's profile, the verdict is persisted
    /// there as well.
    pub async fn check(
        &self,
        uid: Option<&str>,
        account_id: Option<&str>,
    ) -> Result<OnboardingVerdict> {
        let account_id = resolve_account_id(self.store.as_ref(), uid, account_id).await?;
        let id = parse_account_id(&account_id)?;

        let account = Account::retrieve(self.gateway.inner(), &id, &[]).await?;
        let onboarded = derive_onboarded(&account);

        tracing::debug!(
            account = %account_id,
            onboarded,
            details_submitted = ?account.details_submitted,
            charges_enabled = ?account.charges_enabled,
            payouts_enabled = ?account.payouts_enabled,
            "derived onboarding verdict"
        );

        if let Some(uid) = uid {
            self.persist_verdict(uid, &account_id, onboarded).await;
        }

        Ok(OnboardingVerdict {
            account_id,
            onboarded,
        })
    }

    /// Best-effort; a failed store write only delays the profile flag until
    /// the next check.
    async fn persist_verdict(&self, uid: &str, account_id: &str, onboarded: bool) {
        let stored = match self.store.get_user(uid).await {
            Ok(Some(profile)) => profile.stripe_account_id,
            _ => None,
        };
        if stored.as_deref() != Some(account_id) {
            return;
        }
        if let Err(err) = self.store.set_user_onboarded(uid, onboarded).await {
            tracing::warn!(uid, error = %err, "failed to persist onboarding verdict");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account(
        details_submitted: bool,
        charges_enabled: bool,
        payouts_enabled: bool,
        currently_due: Vec<&str>,
        future_due: Vec<&str>,
        disabled_reason: Option<&str>,
    ) -> Account {
        serde_json::from_value(json!({
            "id": "acct_1TESTTESTTESTTEST",
            "object": "account",
            "details_submitted": details_submitted,
            "charges_enabled": charges_enabled,
            "payouts_enabled": payouts_enabled,
            "requirements": {
                "currently_due": currently_due,
                "disabled_reason": disabled_reason,
            },
            "future_requirements": {
                "currently_due": future_due,
            },
        }))
        .expect("account fixture")
    }

    #[test]
    fn test_fully_onboarded() {
        let acct = account(true, true, true, vec![], vec![], None);
        assert!(derive_onboarded(&acct));
    }

    #[test]
    fn test_details_not_submitted() {
        let acct = account(false, true, true, vec![], vec![], None);
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_outstanding_requirement() {
        let acct = account(true, true, true, vec!["individual.id_number"], vec![], None);
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_future_requirement() {
        let acct = account(true, true, true, vec![], vec!["individual.dob.day"], None);
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_charges_disabled() {
        let acct = account(true, false, true, vec![], vec![], None);
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_payouts_disabled() {
        let acct = account(true, true, false, vec![], vec![], None);
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_disabled_reason_blocks() {
        let acct = account(true, true, true, vec![], vec![], Some("requirements.past_due"));
        assert!(!derive_onboarded(&acct));
    }

    #[test]
    fn test_missing_requirement_blocks_are_tolerated() {
        // A minimal account payload with no requirements objects at all
        // still needs its capability flags to pass.
        let acct: Account = serde_json::from_value(json!({
            "id": "acct_1TESTTESTTESTTEST",
            "object": "account",
            "details_submitted": true,
            "charges_enabled": true,
            "payouts_enabled": true,
        }))
        .expect("account fixture");
        assert!(derive_onboarded(&acct));
    }
}
