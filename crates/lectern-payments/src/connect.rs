//! Payee Account Management
//!
//! Creates and refreshes Stripe Express accounts for course creators, and
//! issues the onboarding and dashboard links that go with them. A user has
//! at most one payee account: the stored `stripe_account_id` is checked
//! before any create call.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stripe::{
    Account, AccountBusinessType, AccountId, AccountLink, AccountLinkCollect, AccountLinkType,
    AccountType, BusinessProfile, CreateAccount, CreateAccountCapabilities,
    CreateAccountCapabilitiesCardPayments, CreateAccountCapabilitiesTransfers, CreateAccountLink,
    LoginLink, PersonParams, UpdateAccount,
};

use lectern_core::MarketStore;

use crate::client::StripeGateway;
use crate::config::PlatformConfig;
use crate::error::{PaymentError, Result};
use crate::origin::build_url;

/// A time-limited, single-use onboarding link
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OnboardingLink {
    pub url: String,
    /// Unix timestamp at which the processor expires the link
    pub expires_at: i64,
}

/// Payee account manager
pub struct PayeeAccounts {
    gateway: Arc<StripeGateway>,
    store: Arc<dyn MarketStore>,
    config: Arc<PlatformConfig>,
}

impl PayeeAccounts {
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

    /// Create the payee account for a user, or refresh identity fields on
    /// the one already on file.
    pub async fn create_or_update(&self, uid: &str) -> Result<String> {
        let profile = self
            .store
            .get_user(uid)
            .await?
            .ok_or_else(|| PaymentError::UserNotFound(uid.to_string()))?;
        let (first_name, last_name) = profile.name_parts();

        // An account already exists: refresh identity fields, never create
        // a second one.
        if let Some(account_id) = &profile.stripe_account_id {
            let id = parse_account_id(account_id)?;

            let mut params = UpdateAccount::new();
            params.email = Some(&profile.email);
            params.individual = Some(PersonParams {
                email: Some(profile.email.clone()),
                first_name: Some(first_name),
                last_name,
                ..Default::default()
            });

            Account::update(self.gateway.inner(), &id, params).await?;
            tracing::info!(uid, account = %account_id, "refreshed payee account");
            return Ok(account_id.clone());
        }

        let mut params = CreateAccount::new();
        params.type_ = Some(AccountType::Express);
        params.business_type = Some(AccountBusinessType::Individual);
        params.email = Some(&profile.email);
        params.individual = Some(PersonParams {
            email: Some(profile.email.clone()),
            first_name: Some(first_name),
            last_name,
            ..Default::default()
        });
        params.business_profile = Some(BusinessProfile {
            url: Some(self.config.base_url.clone()),
            product_description: Some(self.config.product_description.clone()),
            mcc: Some(self.config.mcc.clone()),
            ..Default::default()
        });
        params.capabilities = Some(CreateAccountCapabilities {
            card_payments: Some(CreateAccountCapabilitiesCardPayments {
                requested: Some(true),
            }),
            transfers: Some(CreateAccountCapabilitiesTransfers {
                requested: Some(true),
            }),
            ..Default::default()
        });
        params.metadata = Some(HashMap::from([("uid".to_string(), uid.to_string())]));

        let account = Account::create(self.gateway.inner(), params).await?;
        let account_id = account.id.to_string();

        // Persist the new account id before reporting success.
        self.store
            .set_user_account(uid, &account_id, false)
            .await
            .map_err(|err| PaymentError::Store(err.to_string()))?;

        tracing::info!(uid, account = %account_id, "created payee account");
        Ok(account_id)
    }

    /// Issue an onboarding link scoped to currently-due requirements.
    ///
    /// The link is single-use and time-limited; the refresh URL re-enters
    /// this same operation with the same account id.
    pub async fn onboarding_link(
        &self,
        uid: Option<&str>,
        account_id: Option<&str>,
        origin: &str,
    ) -> Result<OnboardingLink> {
        let account_id = resolve_account_id(self.store.as_ref(), uid, account_id).await?;
        let id = parse_account_id(&account_id)?;

        let return_url = build_url(origin, &format!("return/{account_id}"));
        let refresh_url = build_url(origin, &format!("refresh/{account_id}"));

        let mut params = CreateAccountLink::new(id, AccountLinkType::AccountOnboarding);
        params.collect = Some(AccountLinkCollect::CurrentlyDue);
        params.return_url = Some(&return_url);
        params.refresh_url = Some(&refresh_url);

        let link = AccountLink::create(self.gateway.inner(), params).await?;

        Ok(OnboardingLink {
            url: link.url,
            expires_at: link.expires_at,
        })
    }

    /// Issue a dashboard login link.
    ///
    /// When both a uid and an explicit account id are supplied they must
    /// agree with the stored profile, so a caller cannot obtain a login
    /// link for an account they do not own.
    pub async fn login_link(&self, uid: Option<&str>, account_id: Option<&str>) -> Result<String> {
        if let (Some(uid), Some(account)) = (uid, account_id) {
            let profile = self
                .store
                .get_user(uid)
                .await?
                .ok_or_else(|| PaymentError::UserNotFound(uid.to_string()))?;
            if profile.stripe_account_id.as_deref() != Some(account) {
                return Err(PaymentError::AccountMismatch {
                    uid: uid.to_string(),
                    account: account.to_string(),
                });
            }
        }

        let account_id = resolve_account_id(self.store.as_ref(), uid, account_id).await?;

        // No typed request exists for this endpoint in the SDK.
        let link: LoginLink = self
            .gateway
            .inner()
            .post(&format!("/accounts/{account_id}/login_links"))
            .await?;

        Ok(link.url)
    }
}

/// Resolve an account id: explicit id wins, otherwise the stored profile
/// value for the uid.
pub(crate) async fn resolve_account_id(
    store: &dyn MarketStore,
    uid: Option<&str>,
    account_id: Option<&str>,
) -> Result<String> {
    if let Some(id) = account_id {
        return Ok(id.to_string());
    }

    let uid = uid.ok_or(PaymentError::MissingField("uid or accountId"))?;
    let profile = store
        .get_user(uid)
        .await?
        .ok_or_else(|| PaymentError::UserNotFound(uid.to_string()))?;

    profile
        .stripe_account_id
        .ok_or_else(|| PaymentError::NoAccountFound(uid.to_string()))
}

pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId> {
    raw.parse()
        .map_err(|_| PaymentError::InvalidSession(format!("malformed account id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{MemoryStore, UserProfile};

    #[tokio::test]
    async fn test_resolve_prefers_explicit_account() {
        let store = MemoryStore::new();
        let resolved = resolve_account_id(&store, None, Some("acct_explicit"))
            .await
            .unwrap();
        assert_eq!(resolved, "acct_explicit");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_profile() {
        let store = MemoryStore::new();
        let mut user = UserProfile::new("u1", "Jane Doe", "jane@example.com");
        user.stripe_account_id = Some("acct_stored".into());
        store.put_user(&user).await.unwrap();

        let resolved = resolve_account_id(&store, Some("u1"), None).await.unwrap();
        assert_eq!(resolved, "acct_stored");
    }

    #[tokio::test]
    async fn test_resolve_without_any_id_fails() {
        let store = MemoryStore::new();
        let result = resolve_account_id(&store, None, None).await;
        assert!(matches!(result, Err(PaymentError::MissingField(_))));
    }

    #[tokio::test]
    async fn test_resolve_user_without_account_fails() {
        let store = MemoryStore::new();
        store
            .put_user(&UserProfile::new("u1", "Jane Doe", "jane@example.com"))
            .await
            .unwrap();

        let result = resolve_account_id(&store, Some("u1"), None).await;
        assert!(matches!(result, Err(PaymentError::NoAccountFound(_))));
    }

    #[tokio::test]
    async fn test_login_link_rejects_foreign_account() {
        let store = Arc::new(MemoryStore::new());
        let mut user = UserProfile::new("u1", "Jane Doe", "jane@example.com");
        user.stripe_account_id = Some("acct_mine".into());
        store.put_user(&user).await.unwrap();

        let payees = PayeeAccounts::new(
            Arc::new(StripeGateway::new("sk_test_dummy", None)),
            store,
            Arc::new(PlatformConfig::default()),
        );

        let result = payees.login_link(Some("u1"), Some("acct_other")).await;
        assert!(matches!(result, Err(PaymentError::AccountMismatch { .. })));
    }
}
