//! Session Metadata Side-Channel
//!
//! Checkout context crosses the redirect boundary only through processor
//! session metadata: a fixed set of named string fields written at session
//! creation and validated on read-back. The same map is attached to both
//! the session and its payment so either copy can recover the context.

use std::collections::HashMap;

use stripe::Metadata;

use crate::error::{PaymentError, Result};

pub const META_UID: &str = "uid";
pub const META_COURSE_ID: &str = "courseId";
pub const META_CREATOR_UID: &str = "creatorUid";
pub const META_BASE_AMOUNT: &str = "baseAmount";
pub const META_PLATFORM_FEE: &str = "platformFee";
pub const META_CURRENCY: &str = "currency";

/// Full checkout context, written at session creation
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub uid: String,
    pub course_id: String,
    pub creator_uid: String,
    pub base_amount: i64,
    pub platform_fee: i64,
    pub currency: String,
}

impl SessionContext {
    pub fn to_metadata(&self) -> Metadata {
        HashMap::from([
            (META_UID.to_string(), self.uid.clone()),
            (META_COURSE_ID.to_string(), self.course_id.clone()),
            (META_CREATOR_UID.to_string(), self.creator_uid.clone()),
            (META_BASE_AMOUNT.to_string(), self.base_amount.to_string()),
            (META_PLATFORM_FEE.to_string(), self.platform_fee.to_string()),
            (META_CURRENCY.to_string(), self.currency.clone()),
        ])
    }
}

/// Context recovered at finalize time.
///
/// Identity fields are required; amount fields are best-effort since they
/// only feed the integrity check, never the charge itself.
#[derive(Clone, Debug)]
pub struct RecoveredContext {
    pub uid: String,
    pub course_id: String,
    pub creator_uid: Option<String>,
    pub base_amount: Option<i64>,
    pub platform_fee: Option<i64>,
}

impl RecoveredContext {
    /// Read back from session metadata, falling back to the payment's copy
    /// field by field.
    pub fn from_metadata(
        session: Option<&Metadata>,
        payment: Option<&Metadata>,
    ) -> Result<Self> {
        let get = |key: &str| {
            session
                .and_then(|m| m.get(key))
                .or_else(|| payment.and_then(|m| m.get(key)))
                .cloned()
        };

        let uid = get(META_UID)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PaymentError::InvalidSession("session carries no buyer id".into()))?;
        let course_id = get(META_COURSE_ID)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PaymentError::InvalidSession("session carries no course id".into()))?;

        Ok(Self {
            uid,
            course_id,
            creator_uid: get(META_CREATOR_UID),
            base_amount: get(META_BASE_AMOUNT).and_then(|v| v.parse().ok()),
            platform_fee: get(META_PLATFORM_FEE).and_then(|v| v.parse().ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext {
            uid: "buyer-1".into(),
            course_id: "course-1".into(),
            creator_uid: "creator-1".into(),
            base_amount: 1000,
            platform_fee: 300,
            currency: "usd".into(),
        }
    }

    #[test]
    fn test_round_trip() {
        let written = context().to_metadata();
        let read = RecoveredContext::from_metadata(Some(&written), None).unwrap();

        assert_eq!(read.uid, "buyer-1");
        assert_eq!(read.course_id, "course-1");
        assert_eq!(read.creator_uid.as_deref(), Some("creator-1"));
        assert_eq!(read.base_amount, Some(1000));
        assert_eq!(read.platform_fee, Some(300));
    }

    #[test]
    fn test_payment_metadata_fallback() {
        let written = context().to_metadata();
        let read = RecoveredContext::from_metadata(None, Some(&written)).unwrap();
        assert_eq!(read.uid, "buyer-1");
        assert_eq!(read.course_id, "course-1");
    }

    #[test]
    fn test_missing_uid_is_invalid() {
        let mut written = context().to_metadata();
        written.remove(META_UID);
        let result = RecoveredContext::from_metadata(Some(&written), None);
        assert!(matches!(result, Err(PaymentError::InvalidSession(_))));
    }

    #[test]
    fn test_amounts_are_best_effort() {
        let mut written = context().to_metadata();
        written.remove(META_BASE_AMOUNT);
        written.insert(META_PLATFORM_FEE.into(), "garbage".into());

        let read = RecoveredContext::from_metadata(Some(&written), None).unwrap();
        assert!(read.base_amount.is_none());
        assert!(read.platform_fee.is_none());
    }
}
