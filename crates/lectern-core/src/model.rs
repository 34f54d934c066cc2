//! Domain Models
//!
//! Core data types for the course marketplace.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A marketplace user profile
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable identifier issued by the identity provider
    pub uid: String,

    /// Display name as entered at sign-in
    pub display_name: String,

    /// Contact email
    pub email: String,

    /// Avatar URL, if any
    pub photo_url: Option<String>,

    /// Connected payee account at the payment processor, once created
    pub stripe_account_id: Option<String>,

    /// Whether the payee account has cleared onboarding.
    /// Never true while `stripe_account_id` is None.
    #[serde(default)]
    pub stripe_onboarded: bool,
}

impl UserProfile {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            email: email.into(),
            photo_url: None,
            stripe_account_id: None,
            stripe_onboarded: false,
        }
    }

    /// Split the display name into first name and the remainder.
    /// Single-token names yield no last name.
    pub fn name_parts(&self) -> (String, Option<String>) {
        let trimmed = self.display_name.trim();
        match trimmed.split_once(' ') {
            Some((first, rest)) if !rest.trim().is_empty() => {
                (first.to_string(), Some(rest.trim().to_string()))
            }
            _ => (trimmed.to_string(), None),
        }
    }
}

/// A single lesson within a course
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub body: String,
}

/// A published course
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    /// Opaque course identifier
    pub id: String,

    pub title: String,

    pub description: String,

    /// Price in major currency units
    pub price: Decimal,

    /// Free courses bypass checkout entirely
    #[serde(default)]
    pub is_free: bool,

    /// Author of the course; a course without one cannot be sold
    pub creator_uid: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Ordered lesson list
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Effective price: free courses are zero regardless of the stored value
    pub fn effective_price(&self) -> Decimal {
        if self.is_free {
            Decimal::ZERO
        } else {
            self.price
        }
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

/// The durable grant of content access to a buyer for a course.
///
/// Keyed by (uid, course_id). Its existence is the sole authorization
/// check for content access.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub uid: String,

    pub course_id: String,

    /// Acquisition timestamp, set once on first grant
    pub acquired_at: DateTime<Utc>,

    /// 0-based lesson progress, clamped to the course's lesson range
    #[serde(default)]
    pub current_lesson_index: u32,
}

impl PurchaseRecord {
    pub fn new(uid: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            course_id: course_id.into(),
            acquired_at: Utc::now(),
            current_lesson_index: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_name_parts_two_tokens() {
        let user = UserProfile::new("u1", "Jane Doe", "jane@example.com");
        let (first, last) = user.name_parts();
        assert_eq!(first, "Jane");
        assert_eq!(last.as_deref(), Some("Doe"));
    }

    #[test]
    fn test_name_parts_single_token() {
        let user = UserProfile::new("u1", "Jane", "jane@example.com");
        let (first, last) = user.name_parts();
        assert_eq!(first, "Jane");
        assert!(last.is_none());
    }

    #[test]
    fn test_name_parts_multi_word_last_name() {
        let user = UserProfile::new("u1", "Jane van der Berg", "jane@example.com");
        let (first, last) = user.name_parts();
        assert_eq!(first, "Jane");
        assert_eq!(last.as_deref(), Some("van der Berg"));
    }

    #[test]
    fn test_free_course_effective_price_is_zero() {
        let course = Course {
            id: "c1".into(),
            title: "Intro".into(),
            description: String::new(),
            price: dec!(49.99),
            is_free: true,
            creator_uid: Some("u1".into()),
            created_at: Utc::now(),
            lessons: vec![],
        };
        assert_eq!(course.effective_price(), Decimal::ZERO);
    }
}
