//! Submission API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use pokevalue_core::{
    ImageError, LifecycleError, MarketplaceEstimate, QueryError, Submission, SubmissionFilter,
    SubmissionStatus,
};

use crate::state::AppState;

/// Maximum allowed limit for submission listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for submission listings
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a submission
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionBody {
    /// `data:image/<type>;base64,<payload>`
    pub image_data_uri: String,
}

/// Query parameters for creating a submission
#[derive(Debug, Default, Deserialize)]
pub struct CreateSubmissionParams {
    /// Process inline and return the resolved submission
    #[serde(default)]
    pub wait: bool,
}

/// Query parameters for listing submissions
#[derive(Debug, Deserialize)]
pub struct ListSubmissionsParams {
    /// Filter by status (e.g. `COMPLETED`)
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionResponse {
    pub submission_id: String,
}

/// Full submission state as seen by polling clients. The image is not echoed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: String,
    pub status: SubmissionStatus,
    pub card_name: Option<String>,
    pub card_number: Option<String>,
    pub deck_id_letter: Option<String>,
    pub illustrator_name: Option<String>,
    pub estimations: Option<Vec<MarketplaceEstimate>>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        let identity = submission.card_identity;
        Self {
            id: submission.id,
            status: submission.status,
            card_name: identity.as_ref().map(|i| i.name.clone()),
            card_number: identity.as_ref().map(|i| i.number.clone()),
            deck_id_letter: identity.as_ref().and_then(|i| i.deck_id_letter.clone()),
            illustrator_name: identity.and_then(|i| i.illustrator_name),
            estimations: submission.valuation,
            error_message: submission.error_message,
            created_at: submission.created_at.to_rfc3339(),
            updated_at: submission.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing submissions
#[derive(Debug, Serialize)]
pub struct ListSubmissionsResponse {
    pub submissions: Vec<SubmissionResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct SubmissionErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<SubmissionErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(SubmissionErrorResponse {
            error: message.into(),
        }),
    )
}

fn lifecycle_error(e: LifecycleError) -> ApiError {
    let status = match &e {
        LifecycleError::Image(ImageError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        LifecycleError::Image(_) => StatusCode::BAD_REQUEST,
        LifecycleError::AlreadyTerminal { .. } => StatusCode::CONFLICT,
        LifecycleError::Store(_) => {
            error!(error = %e, "Submission store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn query_error(e: QueryError) -> ApiError {
    match e {
        QueryError::NotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        QueryError::Store(_) => {
            error!(error = %e, "Submission store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept a card image.
///
/// Returns 202 with the new id and processes in the background, or with
/// `?wait=true` runs the whole chain and returns the resolved submission.
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateSubmissionParams>,
    body: Result<Json<CreateSubmissionBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::BAD_REQUEST
        };
        api_error(status, rejection.body_text())
    })?;

    if params.wait {
        let submission = state
            .manager()
            .submit_and_wait(&body.image_data_uri)
            .await
            .map_err(lifecycle_error)?;
        return Ok((StatusCode::OK, Json(SubmissionResponse::from(submission))).into_response());
    }

    let submission_id = state
        .manager()
        .submit(&body.image_data_uri)
        .map_err(lifecycle_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateSubmissionResponse { submission_id }),
    )
        .into_response())
}

/// Get a submission by ID
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = state.query().get(&id).map_err(query_error)?;
    Ok(Json(SubmissionResponse::from(submission)))
}

/// List submissions, newest first
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSubmissionsParams>,
) -> Result<Json<ListSubmissionsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = SubmissionFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        let status = status
            .parse::<SubmissionStatus>()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    let page = state.query().list(&filter).map_err(query_error)?;

    Ok(Json(ListSubmissionsResponse {
        submissions: page
            .submissions
            .into_iter()
            .map(SubmissionResponse::from)
            .collect(),
        total: page.total,
        limit,
        offset,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pokevalue_core::CardIdentity;

    #[test]
    fn test_response_flattens_identity() {
        let mut submission = Submission::new("abc", "data:image/png;base64,AAAA", "d", Utc::now());
        submission.status = SubmissionStatus::Completed;
        submission.card_identity =
            Some(CardIdentity::new("Pikachu", "025").with_deck_id_letter("D"));
        submission.valuation = Some(vec![]);

        let json = serde_json::to_value(SubmissionResponse::from(submission)).unwrap();
        assert_eq!(json["cardName"], "Pikachu");
        assert_eq!(json["cardNumber"], "025");
        assert_eq!(json["deckIdLetter"], "D");
        assert!(json["illustratorName"].is_null());
        assert_eq!(json["estimations"], serde_json::json!([]));
        assert_eq!(json["status"], "COMPLETED");
        assert!(json.get("imageDataUri").is_none());
    }

    #[test]
    fn test_image_errors_map_to_client_statuses() {
        let (status, _) = lifecycle_error(LifecycleError::Image(ImageError::TooLarge {
            size: 10,
            max: 5,
        }));
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, Json(body)) = lifecycle_error(LifecycleError::Image(ImageError::NotDataUri));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("data:image"));
    }
}
