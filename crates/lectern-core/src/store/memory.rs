//! In-Memory Store
//!
//! For development and tests. Mirrors the merge semantics of the real
//! document store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::MarketStore;
use crate::error::{CoreError, Result};
use crate::model::{Course, PurchaseRecord, UserProfile};

/// In-memory document store
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserProfile>>,
    courses: RwLock<HashMap<String, Course>>,
    purchases: RwLock<HashMap<(String, String), PurchaseRecord>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            courses: RwLock::new(HashMap::new()),
            purchases: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        let users = self.users.read().unwrap();
        Ok(users.get(uid).cloned())
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        let mut users = self.users.write().unwrap();
        users.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn set_user_account(&self, uid: &str, account_id: &str, onboarded: bool) -> Result<()> {
        let mut users = self.users.write().unwrap();
        let profile = users
            .get_mut(uid)
            .ok_or_else(|| CoreError::UserNotFound(uid.to_string()))?;
        profile.stripe_account_id = Some(account_id.to_string());
        profile.stripe_onboarded = onboarded;
        Ok(())
    }

    async fn set_user_onboarded(&self, uid: &str, onboarded: bool) -> Result<()> {
        let mut users = self.users.write().unwrap();
        let profile = users
            .get_mut(uid)
            .ok_or_else(|| CoreError::UserNotFound(uid.to_string()))?;
        profile.stripe_onboarded = onboarded;
        Ok(())
    }

    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        let courses = self.courses.read().unwrap();
        Ok(courses.get(course_id).cloned())
    }

    async fn put_course(&self, course: &Course) -> Result<()> {
        let mut courses = self.courses.write().unwrap();
        courses.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn get_purchase(&self, uid: &str, course_id: &str) -> Result<Option<PurchaseRecord>> {
        let purchases = self.purchases.read().unwrap();
        Ok(purchases
            .get(&(uid.to_string(), course_id.to_string()))
            .cloned())
    }

    async fn put_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        let mut purchases = self.purchases.write().unwrap();
        purchases.insert(
            (record.uid.clone(), record.course_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_user_round_trip() {
        let store = MemoryStore::new();
        let user = UserProfile::new("u1", "Jane Doe", "jane@example.com");
        store.put_user(&user).await.unwrap();

        let loaded = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "Jane Doe");
        assert!(loaded.stripe_account_id.is_none());
    }

    #[tokio::test]
    async fn test_account_merge_preserves_profile_fields() {
        let store = MemoryStore::new();
        let user = UserProfile::new("u1", "Jane Doe", "jane@example.com");
        store.put_user(&user).await.unwrap();

        store.set_user_account("u1", "acct_123", false).await.unwrap();

        let loaded = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded.email, "jane@example.com");
        assert_eq!(loaded.stripe_account_id.as_deref(), Some("acct_123"));
        assert!(!loaded.stripe_onboarded);
    }

    #[tokio::test]
    async fn test_set_account_on_missing_user_fails() {
        let store = MemoryStore::new();
        let result = store.set_user_account("ghost", "acct_123", false).await;
        assert!(matches!(result, Err(CoreError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_purchase_keyed_by_buyer_and_course() {
        let store = MemoryStore::new();
        let record = PurchaseRecord::new("u1", "c1");
        store.put_purchase(&record).await.unwrap();

        assert!(store.get_purchase("u1", "c1").await.unwrap().is_some());
        assert!(store.get_purchase("u1", "c2").await.unwrap().is_none());
        assert!(store.get_purchase("u2", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_course_round_trip() {
        let store = MemoryStore::new();
        let course = Course {
            id: "c1".into(),
            title: "Rust 101".into(),
            description: "Basics".into(),
            price: dec!(10.00),
            is_free: false,
            creator_uid: Some("u1".into()),
            created_at: Utc::now(),
            lessons: vec![],
        };
        store.put_course(&course).await.unwrap();

        let loaded = store.get_course("c1").await.unwrap().unwrap();
        assert_eq!(loaded.price, dec!(10.00));
    }
}
