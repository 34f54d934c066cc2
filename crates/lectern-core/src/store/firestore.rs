//! Firestore REST Store
//!
//! Talks to the Firestore documents API over REST. Partial writes use
//! `updateMask` so they merge into existing documents instead of replacing
//! them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::MarketStore;
use crate::error::{CoreError, Result};
use crate::model::{Course, Lesson, PurchaseRecord, UserProfile};

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

/// Firestore-backed document store
pub struct FirestoreStore {
    http: reqwest::Client,
    project_id: String,
    access_token: String,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: project_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let project_id = std::env::var("FIRESTORE_PROJECT_ID")
            .map_err(|_| CoreError::Store("FIRESTORE_PROJECT_ID not set".into()))?;
        let access_token = std::env::var("FIRESTORE_ACCESS_TOKEN")
            .map_err(|_| CoreError::Store("FIRESTORE_ACCESS_TOKEN not set".into()))?;
        Ok(Self::new(project_id, access_token))
    }

    fn doc_url(&self, path: &str) -> String {
        format!(
            "{FIRESTORE_BASE}/projects/{}/databases/(default)/documents/{path}",
            self.project_id
        )
    }

    async fn get_doc(&self, path: &str) -> Result<Option<Value>> {
        let resp = self
            .http
            .get(self.doc_url(path))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = resp.error_for_status()?;
        Ok(Some(resp.json::<Value>().await?))
    }

    /// Merge-write the given fields. An empty mask replaces the whole document.
    async fn patch_doc(&self, path: &str, fields: Value, mask: &[&str]) -> Result<()> {
        let mut url = self.doc_url(path);
        if !mask.is_empty() {
            let params: Vec<String> = mask
                .iter()
                .map(|f| format!("updateMask.fieldPaths={f}"))
                .collect();
            url = format!("{url}?{}", params.join("&"));
        }

        self.http
            .patch(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "fields": fields }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[async_trait]
impl MarketStore for FirestoreStore {
    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        let Some(doc) = self.get_doc(&format!("users/{uid}")).await? else {
            return Ok(None);
        };
        let fields = &doc["fields"];
        Ok(Some(UserProfile {
            uid: uid.to_string(),
            display_name: string_field(fields, "displayName").unwrap_or_default(),
            email: string_field(fields, "email").unwrap_or_default(),
            photo_url: string_field(fields, "photoURL"),
            stripe_account_id: string_field(fields, "stripeAccountId"),
            stripe_onboarded: bool_field(fields, "stripeOnboarded"),
        }))
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<()> {
        let mut fields = json!({
            "displayName": { "stringValue": profile.display_name },
            "email": { "stringValue": profile.email },
            "stripeOnboarded": { "booleanValue": profile.stripe_onboarded },
        });
        if let Some(photo) = &profile.photo_url {
            fields["photoURL"] = json!({ "stringValue": photo });
        }
        if let Some(account) = &profile.stripe_account_id {
            fields["stripeAccountId"] = json!({ "stringValue": account });
        }
        self.patch_doc(&format!("users/{}", profile.uid), fields, &[])
            .await
    }

    async fn set_user_account(&self, uid: &str, account_id: &str, onboarded: bool) -> Result<()> {
        let fields = json!({
            "stripeAccountId": { "stringValue": account_id },
            "stripeOnboarded": { "booleanValue": onboarded },
        });
        self.patch_doc(
            &format!("users/{uid}"),
            fields,
            &["stripeAccountId", "stripeOnboarded"],
        )
        .await
    }

    async fn set_user_onboarded(&self, uid: &str, onboarded: bool) -> Result<()> {
        let fields = json!({
            "stripeOnboarded": { "booleanValue": onboarded },
        });
        self.patch_doc(&format!("users/{uid}"), fields, &["stripeOnboarded"])
            .await
    }

    async fn get_course(&self, course_id: &str) -> Result<Option<Course>> {
        let Some(doc) = self.get_doc(&format!("courses/{course_id}")).await? else {
            return Ok(None);
        };
        let fields = &doc["fields"];

        let price = fields["price"]["doubleValue"]
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .unwrap_or(Decimal::ZERO);

        let lessons = fields["lessons"]["arrayValue"]["values"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .map(|v| Lesson {
                        title: string_field(&v["mapValue"]["fields"], "title").unwrap_or_default(),
                        body: string_field(&v["mapValue"]["fields"], "body").unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(Course {
            id: course_id.to_string(),
            title: string_field(fields, "title").unwrap_or_default(),
            description: string_field(fields, "description").unwrap_or_default(),
            price,
            is_free: bool_field(fields, "isFree"),
            creator_uid: string_field(fields, "creatorUid"),
            created_at: timestamp_field(fields, "created").unwrap_or_else(Utc::now),
            lessons,
        }))
    }

    async fn put_course(&self, course: &Course) -> Result<()> {
        let lessons: Vec<Value> = course
            .lessons
            .iter()
            .map(|l| {
                json!({ "mapValue": { "fields": {
                    "title": { "stringValue": l.title },
                    "body": { "stringValue": l.body },
                }}})
            })
            .collect();

        let mut fields = json!({
            "title": { "stringValue": course.title },
            "description": { "stringValue": course.description },
            "price": { "doubleValue": course.price.to_f64().unwrap_or(0.0) },
            "isFree": { "booleanValue": course.is_free },
            "created": { "timestampValue": course.created_at.to_rfc3339() },
            "lessons": { "arrayValue": { "values": lessons } },
        });
        if let Some(creator) = &course.creator_uid {
            fields["creatorUid"] = json!({ "stringValue": creator });
        }
        self.patch_doc(&format!("courses/{}", course.id), fields, &[])
            .await
    }

    async fn get_purchase(&self, uid: &str, course_id: &str) -> Result<Option<PurchaseRecord>> {
        let Some(doc) = self
            .get_doc(&format!("customers/{uid}/courses/{course_id}"))
            .await?
        else {
            return Ok(None);
        };
        let fields = &doc["fields"];
        Ok(Some(PurchaseRecord {
            uid: uid.to_string(),
            course_id: course_id.to_string(),
            acquired_at: timestamp_field(fields, "created").unwrap_or_else(Utc::now),
            current_lesson_index: integer_field(fields, "currentLessonIndex").unwrap_or(0) as u32,
        }))
    }

    async fn put_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        let fields = json!({
            "created": { "timestampValue": record.acquired_at.to_rfc3339() },
            "currentLessonIndex": { "integerValue": record.current_lesson_index.to_string() },
        });
        self.patch_doc(
            &format!("customers/{}/courses/{}", record.uid, record.course_id),
            fields,
            &["created", "currentLessonIndex"],
        )
        .await
    }

    async fn health_check(&self) -> bool {
        // A get against a known-missing doc still proves connectivity/auth.
        self.get_doc("users/__health__").await.is_ok()
    }

    fn name(&self) -> &str {
        "firestore"
    }
}

fn string_field(fields: &Value, name: &str) -> Option<String> {
    fields[name]["stringValue"].as_str().map(str::to_string)
}

fn bool_field(fields: &Value, name: &str) -> bool {
    fields[name]["booleanValue"].as_bool().unwrap_or(false)
}

/// Firestore encodes integers as strings on the wire
fn integer_field(fields: &Value, name: &str) -> Option<i64> {
    fields[name]["integerValue"].as_str()?.parse().ok()
}

fn timestamp_field(fields: &Value, name: &str) -> Option<DateTime<Utc>> {
    let raw = fields[name]["timestampValue"].as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_field_parses_wire_string() {
        let fields = json!({ "currentLessonIndex": { "integerValue": "3" } });
        assert_eq!(integer_field(&fields, "currentLessonIndex"), Some(3));
    }

    #[test]
    fn test_missing_fields_decode_as_none() {
        let fields = json!({});
        assert!(string_field(&fields, "displayName").is_none());
        assert!(!bool_field(&fields, "stripeOnboarded"));
        assert!(timestamp_field(&fields, "created").is_none());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let fields = json!({ "created": { "timestampValue": now.to_rfc3339() } });
        let parsed = timestamp_field(&fields, "created").unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }
}
