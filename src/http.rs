//! HTTP surface
//!
//! Routes:
//! - `GET /health`
//! - `GET /api/fitbit?date=&include=intraday`
//! - `GET /api/prediction?days=&date=`
//! - `GET /api/curve?wake=&hours=`

use crate::curve::check_curve_request;
use crate::error::ComputeError;
use crate::pipeline::{parse_date, ExportStore, IntradaySource, PredictionService};
use crate::types::CurveComparisonPoint;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Shared handler state
pub struct AppState {
    pub store: Arc<ExportStore>,
    pub predictions: PredictionService,
    /// Clock used for the single-day projection
    pub clock: fn() -> NaiveDateTime,
}

impl AppState {
    pub fn new(store: Arc<ExportStore>, predictions: PredictionService) -> Self {
        Self {
            store,
            predictions,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Error responses in the shapes the dashboard expects
#[derive(Debug)]
pub enum ApiError {
    /// Failure while reading the export folder
    Fitbit { root: PathBuf, error: ComputeError },
    /// Failure of a prediction or curve request
    Compute(ComputeError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Fitbit { error, .. } if error.is_client_error() => (
                StatusCode::BAD_REQUEST,
                json!({ "error": error.to_string() }),
            ),
            ApiError::Fitbit {
                root,
                error: ComputeError::MissingRoot(_),
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Folder not found", "root": root.display().to_string() }),
            ),
            ApiError::Fitbit { error, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to load Fitbit data", "details": error.to_string() }),
            ),
            ApiError::Compute(error) if error.is_client_error() => (
                StatusCode::BAD_REQUEST,
                json!({ "error": error.to_string() }),
            ),
            ApiError::Compute(ComputeError::Prediction(message)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            ),
            ApiError::Compute(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": error.to_string() }),
            ),
        };
        if status.is_server_error() {
            tracing::error!(%status, body = %body, "request failed");
        } else {
            tracing::info!(%status, body = %body, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FitbitQuery {
    pub date: Option<String>,
    pub include: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionQuery {
    pub days: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurveQuery {
    pub wake: Option<String>,
    pub hours: Option<String>,
}

fn parse_param<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
) -> Result<Option<T>, ComputeError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ComputeError::InvalidQuery(format!("invalid {name}: {value:?}"))),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn fitbit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FitbitQuery>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("fitbit", %request_id, date = ?query.date);
    let store = Arc::clone(&state.store);
    let root = store.root().to_path_buf();
    let fitbit_error = |error: ComputeError| ApiError::Fitbit {
        root: root.clone(),
        error,
    };

    async move {
        let intraday_date = match (&query.date, query.include.as_deref()) {
            (Some(date), Some("intraday")) => Some(parse_date(date).map_err(&fitbit_error)?),
            _ => None,
        };

        let response = match intraday_date {
            Some(date) => {
                let report = tokio::task::spawn_blocking(move || store.intraday(date))
                    .await
                    .map_err(|e| {
                        fitbit_error(ComputeError::Upstream {
                            date: date.to_string(),
                            message: e.to_string(),
                        })
                    })?
                    .map_err(&fitbit_error)?;
                tracing::info!(
                    heart_rate = report.heart_rate.len(),
                    steps = report.steps.len(),
                    "intraday report served"
                );
                Json(report).into_response()
            }
            None => {
                let overview = tokio::task::spawn_blocking(move || store.sleep_overview())
                    .await
                    .map_err(|e| fitbit_error(ComputeError::Io(std::io::Error::other(e))))?
                    .map_err(&fitbit_error)?;
                tracing::info!(days = overview.sleep_day_count, "sleep overview served");
                Json(overview).into_response()
            }
        };
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn prediction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictionQuery>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "prediction",
        %request_id,
        days = ?query.days,
        date = ?query.date
    );

    async move {
        let now = (state.clock)();
        let days = parse_param::<u32>("days", query.days.as_deref())
            .map_err(ApiError::Compute)?
            .unwrap_or(1);
        let end_date = match query.date.as_deref() {
            Some(raw) => parse_date(raw).map_err(ApiError::Compute)?,
            None => now.date(),
        };

        let response = state
            .predictions
            .predict(days, end_date, now)
            .await
            .map_err(ApiError::Compute)?;
        Ok(Json(response).into_response())
    }
    .instrument(span)
    .await
}

async fn curve(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurveQuery>,
) -> Result<Json<Vec<CurveComparisonPoint>>, ApiError> {
    let projector = state.predictions.projector();
    let config = projector.config();

    let wake = parse_param::<f64>("wake", query.wake.as_deref())
        .map_err(ApiError::Compute)?
        .unwrap_or(config.population_wake_level);
    let hours = parse_param::<u32>("hours", query.hours.as_deref())
        .map_err(ApiError::Compute)?
        .unwrap_or(config.curve_hours);

    check_curve_request(wake, hours).map_err(ApiError::Compute)?;

    Ok(Json(projector.compare_curve(wake, hours)))
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/fitbit", get(fitbit))
        .route("/api/prediction", get(prediction))
        .route("/api/curve", get(curve))
        .with_state(state)
}
