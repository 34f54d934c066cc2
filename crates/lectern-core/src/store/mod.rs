//! Document Store Integration
//!
//! Abstractions and implementations for the marketplace document store.

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Course, PurchaseRecord, UserProfile};

/// Document store client trait
///
/// Per-document get and merge-write access to the three collections this
/// system reads and mutates. Writes that touch a subset of fields use merge
/// semantics so unrelated fields survive.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Fetch a user profile by identifier
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>>;

    /// Full write of a user profile (seeding / external sign-in path)
    async fn put_user(&self, profile: &UserProfile) -> Result<()>;

    /// Merge the payee account fields into the user document
    async fn set_user_account(&self, uid: &str, account_id: &str, onboarded: bool) -> Result<()>;

    /// Merge the onboarding verdict into the user document
    async fn set_user_onboarded(&self, uid: &str, onboarded: bool) -> Result<()>;

    /// Fetch a course by identifier
    async fn get_course(&self, course_id: &str) -> Result<Option<Course>>;

    /// Full write of a course (seeding / authoring path)
    async fn put_course(&self, course: &Course) -> Result<()>;

    /// Fetch the purchase record for (uid, course)
    async fn get_purchase(&self, uid: &str, course_id: &str) -> Result<Option<PurchaseRecord>>;

    /// Merge-write the purchase record for (uid, course)
    async fn put_purchase(&self, record: &PurchaseRecord) -> Result<()>;

    /// Check if the store backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name for diagnostics
    fn name(&self) -> &str;
}
