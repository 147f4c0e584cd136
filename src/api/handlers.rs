use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::extract::ClientInfo;
use crate::analytics::{ErrorKind, StatisticsReport, TrackingError, VisitorTracker};
use crate::models::{DurationOutcome, GalleryViewOutcome, ScreenSize, VisitOutcome};

pub struct AppState {
    pub tracker: Arc<VisitorTracker>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Tracking failure rendered as a JSON error with a status matching its kind
pub struct ApiError(pub TrackingError);

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
pub struct TrackVisitRequest {
    pub path: Option<String>,
    #[serde(default)]
    pub analytics_consent: bool,
}

#[derive(Debug, Serialize)]
pub struct TrackVisitResponse {
    pub visit_id: i64,
    pub new_visitor: bool,
    pub duplicate: bool,
}

#[derive(Deserialize)]
pub struct UpdateDurationRequest {
    /// Seconds spent on the page
    pub duration: i64,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GalleryViewResponse {
    pub view_id: i64,
    pub created: bool,
}

/// Record a page visit
pub async fn track_visit(
    State(state): State<Arc<AppState>>,
    ClientInfo(client): ClientInfo,
    Json(payload): Json<TrackVisitRequest>,
) -> Result<(StatusCode, Json<TrackVisitResponse>), ApiError> {
    let client = client.with_consent(payload.analytics_consent);
    let outcome = state
        .tracker
        .track_page_visit(payload.path.as_deref(), &client)
        .await?;

    let response = match outcome {
        VisitOutcome::Recorded {
            visit_id,
            new_visitor,
        } => (
            StatusCode::CREATED,
            Json(TrackVisitResponse {
                visit_id,
                new_visitor,
                duplicate: false,
            }),
        ),
        VisitOutcome::Duplicate { visit_id } => (
            StatusCode::OK,
            Json(TrackVisitResponse {
                visit_id,
                new_visitor: false,
                duplicate: true,
            }),
        ),
    };

    Ok(response)
}

/// Report how long a visitor stayed on a page
pub async fn update_duration(
    State(state): State<Arc<AppState>>,
    Path(visit_id): Path<i64>,
    Json(payload): Json<UpdateDurationRequest>,
) -> Result<Json<DurationOutcome>, ApiError> {
    let screen = ScreenSize::from_parts(payload.screen_width, payload.screen_height);
    let outcome = state
        .tracker
        .update_visit_duration(visit_id, payload.duration, screen)
        .await?;

    Ok(Json(outcome))
}

/// Record a gallery image view
pub async fn track_gallery_view(
    State(state): State<Arc<AppState>>,
    ClientInfo(client): ClientInfo,
    Path(image_id): Path<i64>,
) -> Result<Json<GalleryViewResponse>, ApiError> {
    let outcome = state
        .tracker
        .track_gallery_view(image_id, Some(&client))
        .await?
        .ok_or(TrackingError::ImageNotFound(image_id))?;

    Ok(Json(GalleryViewResponse {
        view_id: outcome.view_id(),
        created: matches!(outcome, GalleryViewOutcome::Created(_)),
    }))
}

/// Report over the configured window; never fails
pub async fn get_statistics(State(state): State<Arc<AppState>>) -> Json<StatisticsReport> {
    Json(state.tracker.get_statistics().await)
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
