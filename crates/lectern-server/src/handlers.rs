//! HTTP Handlers
//!
//! One handler per operation. Inputs are JSON bodies; the request origin
//! comes from the `Origin` header and is normalized before it is baked
//! into any redirect URL. Errors map onto a uniform `{error}` body.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use lectern_core::{CoreError, MarketStore};
use lectern_payments::{normalize_origin, PaymentError};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: String,
    pub store_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountResponse {
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OnboardingLinkResponse {
    pub url: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginLinkResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatusResponse {
    pub account_id: String,
    pub onboarded: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCheckoutResponse {
    pub url: String,
    pub id: String,
    pub total_amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub ok: bool,
    pub course_id: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeEnrollRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeEnrollResponse {
    pub ok: bool,
    pub course_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub lesson_index: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub current_lesson_index: u32,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a payment error onto the uniform `{error}` body and an HTTP status:
/// 400 validation, 403 authorization, 404 missing entity, 500 upstream.
fn payment_error(err: PaymentError) -> ApiError {
    use PaymentError::{
        AccountMismatch, CourseIsFree, CourseMisconfigured, CourseNotFound, CreatorNotOnboarded,
        IdentityMismatch, InvalidSession, MissingField, MissingPayment, NoAccountFound,
        PaymentNotCompleted, PriceTooLow, UserNotFound,
    };

    let status = match &err {
        MissingField(_) | InvalidSession(_) | CourseMisconfigured(_) | CourseIsFree(_)
        | CreatorNotOnboarded | PriceTooLow { .. } | PaymentNotCompleted(_) | MissingPayment(_) => {
            StatusCode::BAD_REQUEST
        }
        IdentityMismatch | AccountMismatch { .. } => StatusCode::FORBIDDEN,
        UserNotFound(_) | CourseNotFound(_) | NoAccountFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "upstream failure");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
        }),
    )
}

fn core_error(err: CoreError) -> ApiError {
    let status = match &err {
        CoreError::UserNotFound(_) | CoreError::CourseNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::AccessDenied(_) => StatusCode::FORBIDDEN,
        CoreError::CourseNotFree(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "store failure");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn missing(field: &'static str) -> ApiError {
    payment_error(PaymentError::MissingField(field))
}

/// Normalized request origin: the `Origin` header when present, the
/// configured base URL otherwise.
fn request_origin(headers: &HeaderMap, fallback: &str) -> String {
    let raw = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    normalize_origin(raw, fallback)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = state.store.health_check().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.name().to_string(),
        store_connected,
    })
}

/// Create or refresh the payee account for a creator
pub async fn create_payee_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, ApiError> {
    if payload.uid.trim().is_empty() {
        return Err(missing("uid"));
    }

    let account_id = state
        .payees
        .create_or_update(&payload.uid)
        .await
        .map_err(payment_error)?;

    Ok(Json(CreateAccountResponse { account_id }))
}

/// Issue a time-limited onboarding link
pub async fn create_onboarding_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AccountRef>,
) -> Result<Json<OnboardingLinkResponse>, ApiError> {
    if payload.uid.is_none() && payload.account_id.is_none() {
        return Err(missing("uid or accountId"));
    }

    let origin = request_origin(&headers, &state.config.base_url);
    let link = state
        .payees
        .onboarding_link(
            payload.uid.as_deref(),
            payload.account_id.as_deref(),
            &origin,
        )
        .await
        .map_err(payment_error)?;

    Ok(Json(OnboardingLinkResponse {
        url: link.url,
        expires_at: link.expires_at,
    }))
}

/// Issue a dashboard login link for the caller's own account
pub async fn create_login_link(
    State(state): State<AppState>,
    Json(payload): Json<AccountRef>,
) -> Result<Json<LoginLinkResponse>, ApiError> {
    if payload.uid.is_none() && payload.account_id.is_none() {
        return Err(missing("uid or accountId"));
    }

    let url = state
        .payees
        .login_link(payload.uid.as_deref(), payload.account_id.as_deref())
        .await
        .map_err(payment_error)?;

    Ok(Json(LoginLinkResponse { url }))
}

/// Check and persist the onboarding verdict
pub async fn check_onboarding_status(
    State(state): State<AppState>,
    Json(payload): Json<AccountRef>,
) -> Result<Json<OnboardingStatusResponse>, ApiError> {
    if payload.uid.is_none() && payload.account_id.is_none() {
        return Err(missing("uid or accountId"));
    }

    let verdict = state
        .onboarding
        .check(payload.uid.as_deref(), payload.account_id.as_deref())
        .await
        .map_err(payment_error)?;

    Ok(Json(OnboardingStatusResponse {
        account_id: verdict.account_id,
        onboarded: verdict.onboarded,
    }))
}

/// Start a checkout for a paid course
pub async fn start_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<StartCheckoutRequest>,
) -> Result<Json<StartCheckoutResponse>, ApiError> {
    if payload.uid.trim().is_empty() {
        return Err(missing("uid"));
    }
    if payload.course_id.trim().is_empty() {
        return Err(missing("courseId"));
    }

    let origin = request_origin(&headers, &state.config.base_url);
    let quote = state
        .checkout
        .start_checkout(&payload.uid, &payload.course_id, &origin)
        .await
        .map_err(payment_error)?;

    Ok(Json(StartCheckoutResponse {
        url: quote.url,
        id: quote.id,
        total_amount: quote.total_amount,
    }))
}

/// Finalize a completed checkout and grant access
pub async fn finalize_checkout(
    State(state): State<AppState>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    if payload.uid.trim().is_empty() {
        return Err(missing("uid"));
    }
    if payload.session_id.trim().is_empty() {
        return Err(missing("sessionId"));
    }

    let outcome = state
        .finalizer
        .finalize(&payload.uid, &payload.session_id)
        .await
        .map_err(payment_error)?;

    Ok(Json(FinalizeResponse {
        ok: true,
        course_id: outcome.course_id,
        customer_id: outcome.customer_id,
    }))
}

/// Direct grant for free courses
pub async fn free_enroll(
    State(state): State<AppState>,
    Json(payload): Json<FreeEnrollRequest>,
) -> Result<Json<FreeEnrollResponse>, ApiError> {
    if payload.uid.trim().is_empty() {
        return Err(missing("uid"));
    }
    if payload.course_id.trim().is_empty() {
        return Err(missing("courseId"));
    }

    let record = state
        .access
        .grant_free(&payload.uid, &payload.course_id)
        .await
        .map_err(core_error)?;

    Ok(Json(FreeEnrollResponse {
        ok: true,
        course_id: record.course_id,
    }))
}

/// Record lesson progress for a purchased course
pub async fn record_progress(
    State(state): State<AppState>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    if payload.uid.trim().is_empty() {
        return Err(missing("uid"));
    }
    if payload.course_id.trim().is_empty() {
        return Err(missing("courseId"));
    }

    let index = state
        .access
        .record_progress(&payload.uid, &payload.course_id, payload.lesson_index)
        .await
        .map_err(core_error)?;

    Ok(Json(ProgressResponse {
        current_lesson_index: index,
    }))
}

/// Stripe webhook intake
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let secret = state.gateway.webhook_secret().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Webhook intake not configured".into(),
            }),
        )
    })?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing Stripe signature".into(),
                }),
            )
        })?;

    let event = state
        .webhooks
        .parse_event(&body, signature, secret)
        .map_err(|err| {
            tracing::warn!(error = %err, "webhook signature verification failed");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Invalid signature".into(),
                }),
            )
        })?;

    state.webhooks.handle(event).await.map_err(payment_error)?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_faults_map_to_400() {
        let (status, _) = payment_error(PaymentError::MissingField("uid"));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = payment_error(PaymentError::PriceTooLow {
            price: 50,
            minimum: 100,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = payment_error(PaymentError::PaymentNotCompleted("cs_1".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_authorization_faults_map_to_403() {
        let (status, _) = payment_error(PaymentError::IdentityMismatch);
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = payment_error(PaymentError::AccountMismatch {
            uid: "u1".into(),
            account: "acct_1".into(),
        });
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_not_found_faults_map_to_404() {
        let (status, _) = payment_error(PaymentError::CourseNotFound("c1".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = payment_error(PaymentError::NoAccountFound("u1".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_upstream_faults_map_to_500_with_generic_body() {
        let (status, body) = payment_error(PaymentError::Stripe("secret detail".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.0.error.contains("secret detail"));
    }

    #[test]
    fn test_core_access_denied_maps_to_403() {
        let (status, _) = core_error(CoreError::AccessDenied("c1".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_request_origin_falls_back() {
        let headers = HeaderMap::new();
        assert_eq!(
            request_origin(&headers, "https://lectern.test"),
            "https://lectern.test"
        );
    }

    #[test]
    fn test_request_origin_normalizes_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, "http://example.com".parse().unwrap());
        assert_eq!(
            request_origin(&headers, "https://lectern.test"),
            "https://example.com"
        );
    }
}
