//! Content Access Grants
//!
//! The purchase record is the sole authorization for course content. Grants
//! are read-then-write merges and safe to repeat: the first call creates the
//! record, later calls leave the acquisition timestamp and progress alone.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::{CoreError, Result};
use crate::model::PurchaseRecord;
use crate::store::MarketStore;

/// Access-grant and progress operations over the document store
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn MarketStore>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Idempotent purchase grant for (uid, course).
    ///
    /// Re-running for the same pair returns the existing record unchanged,
    /// so a retried finalize never resets progress or the timestamp.
    pub async fn grant_purchase(&self, uid: &str, course_id: &str) -> Result<PurchaseRecord> {
        if let Some(existing) = self.store.get_purchase(uid, course_id).await? {
            tracing::debug!(uid, course_id, "purchase already granted");
            return Ok(existing);
        }

        let record = PurchaseRecord::new(uid, course_id);
        self.store.put_purchase(&record).await?;
        tracing::info!(uid, course_id, "granted course access");
        Ok(record)
    }

    /// Direct grant for free courses. Priced courses must go through checkout.
    pub async fn grant_free(&self, uid: &str, course_id: &str) -> Result<PurchaseRecord> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| CoreError::CourseNotFound(course_id.to_string()))?;

        if !course.is_free && course.effective_price() > Decimal::ZERO {
            return Err(CoreError::CourseNotFree(course_id.to_string()));
        }

        self.grant_purchase(uid, course_id).await
    }

    /// Whether the buyer holds a purchase record for the course
    pub async fn has_access(&self, uid: &str, course_id: &str) -> Result<bool> {
        Ok(self.store.get_purchase(uid, course_id).await?.is_some())
    }

    /// Advance lesson progress, clamped to the course's lesson range.
    /// Requires an existing purchase record.
    pub async fn record_progress(&self, uid: &str, course_id: &str, lesson_index: i64) -> Result<u32> {
        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| CoreError::CourseNotFound(course_id.to_string()))?;

        let mut record = self
            .store
            .get_purchase(uid, course_id)
            .await?
            .ok_or_else(|| CoreError::AccessDenied(course_id.to_string()))?;

        let max_index = course.lesson_count().saturating_sub(1) as i64;
        let clamped = lesson_index.clamp(0, max_index.max(0)) as u32;

        record.current_lesson_index = clamped;
        self.store.put_purchase(&record).await?;
        Ok(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Course, Lesson, UserProfile};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn course(id: &str, price: Decimal, is_free: bool, lessons: usize) -> Course {
        Course {
            id: id.into(),
            title: "Test Course".into(),
            description: String::new(),
            price,
            is_free,
            creator_uid: Some("creator".into()),
            created_at: Utc::now(),
            lessons: (0..lessons)
                .map(|i| Lesson {
                    title: format!("Lesson {i}"),
                    body: String::new(),
                })
                .collect(),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, AccessControl) {
        let store = Arc::new(MemoryStore::new());
        store
            .put_user(&UserProfile::new("buyer", "Buy Er", "b@example.com"))
            .await
            .unwrap();
        let access = AccessControl::new(store.clone());
        (store, access)
    }

    #[tokio::test]
    async fn test_grant_is_idempotent() {
        let (_store, access) = setup().await;

        let first = access.grant_purchase("buyer", "c1").await.unwrap();
        let second = access.grant_purchase("buyer", "c1").await.unwrap();

        assert_eq!(first.acquired_at, second.acquired_at);
        assert_eq!(second.current_lesson_index, 0);
    }

    #[tokio::test]
    async fn test_regrant_preserves_progress() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), false, 5)).await.unwrap();

        access.grant_purchase("buyer", "c1").await.unwrap();
        access.record_progress("buyer", "c1", 3).await.unwrap();

        // A duplicate finalize must not reset the buyer's place.
        let regrant = access.grant_purchase("buyer", "c1").await.unwrap();
        assert_eq!(regrant.current_lesson_index, 3);
    }

    #[tokio::test]
    async fn test_free_grant_rejects_priced_course() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), false, 1)).await.unwrap();

        let result = access.grant_free("buyer", "c1").await;
        assert!(matches!(result, Err(CoreError::CourseNotFree(_))));
        assert!(!access.has_access("buyer", "c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_free_grant_allows_free_course_twice() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), true, 1)).await.unwrap();

        let first = access.grant_free("buyer", "c1").await.unwrap();
        let second = access.grant_free("buyer", "c1").await.unwrap();
        assert_eq!(first.acquired_at, second.acquired_at);
    }

    #[tokio::test]
    async fn test_access_denied_without_record() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), false, 3)).await.unwrap();

        assert!(!access.has_access("buyer", "c1").await.unwrap());
        let result = access.record_progress("buyer", "c1", 1).await;
        assert!(matches!(result, Err(CoreError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_progress_clamps_both_ends() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), false, 3)).await.unwrap();
        access.grant_purchase("buyer", "c1").await.unwrap();

        assert_eq!(access.record_progress("buyer", "c1", -5).await.unwrap(), 0);
        assert_eq!(access.record_progress("buyer", "c1", 99).await.unwrap(), 2);
        assert_eq!(access.record_progress("buyer", "c1", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_progress_on_lessonless_course_stays_zero() {
        let (store, access) = setup().await;
        store.put_course(&course("c1", dec!(10), false, 0)).await.unwrap();
        access.grant_purchase("buyer", "c1").await.unwrap();

        assert_eq!(access.record_progress("buyer", "c1", 4).await.unwrap(), 0);
    }
}
