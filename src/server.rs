use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::ClassifyError;
use crate::pipeline::{Analysis, SentimentPipeline};
use crate::samples::{SAMPLE_ARTICLES, SampleArticle, find_sample};
use crate::service::ServiceState;
use crate::types::AnalyzeRequest;

#[derive(Clone)]
pub struct AppState {
    pipeline: SentimentPipeline,
}

impl AppState {
    pub fn new(pipeline: SentimentPipeline) -> Self {
        Self { pipeline }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/chart.svg", post(chart_handler))
        .route("/samples", get(samples_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ClassifyError> for ApiError {
    fn from(err: ClassifyError) -> Self {
        let status = match &err {
            ClassifyError::EmptyInput => StatusCode::BAD_REQUEST,
            ClassifyError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ClassifyError::ClassificationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            ClassifyError::ModelUnavailable(cause) => format!("{err}: {cause}"),
            _ => err.to_string(),
        };
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn resolve_text(request: &AnalyzeRequest) -> Result<&str, ApiError> {
    match (&request.text, &request.sample) {
        (Some(text), None) => Ok(text.as_str()),
        (None, Some(name)) => find_sample(name).map(|sample| sample.text).ok_or_else(|| {
            ApiError::new(StatusCode::NOT_FOUND, format!("unknown sample {name:?}"))
        }),
        (Some(_), Some(_)) => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "provide either text or sample, not both",
        )),
        (None, None) => Err(ApiError::new(StatusCode::BAD_REQUEST, "provide text or sample")),
    }
}

async fn run_analysis(state: &AppState, request: &AnalyzeRequest) -> Result<Analysis, ApiError> {
    counter!("sentiment_requests_total").increment(1);
    let text = resolve_text(request)?;

    match state.pipeline.analyze(text).await {
        Ok(analysis) => {
            if matches!(analysis, Analysis::AwaitingInput { .. }) {
                counter!("sentiment_empty_input_total").increment(1);
            }
            Ok(analysis)
        }
        Err(err) => {
            counter!("sentiment_failures_total").increment(1);
            tracing::error!(error = %err, "Sentiment analysis failed");
            Err(err.into())
        }
    }
}

#[tracing::instrument(skip(state, request), fields(sample = ?request.sample))]
async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = run_analysis(&state, &request).await?;
    tracing::info!("Sentiment analysis completed");
    Ok(Json(analysis))
}

#[tracing::instrument(skip(state, request), fields(sample = ?request.sample))]
async fn chart_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, ApiError> {
    match run_analysis(&state, &request).await? {
        Analysis::AwaitingInput { .. } => Ok(StatusCode::NO_CONTENT.into_response()),
        Analysis::Analyzed { report } => Ok((
            [(header::CONTENT_TYPE, "image/svg+xml")],
            report.chart.to_svg(),
        )
            .into_response()),
    }
}

async fn samples_handler() -> Json<&'static [SampleArticle]> {
    Json(&SAMPLE_ARTICLES[..])
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let service = state.pipeline.service();
    let model = service.model_id();
    match service.state() {
        ServiceState::Ready => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "model": model })),
        ),
        ServiceState::Uninitialized => (
            StatusCode::OK,
            Json(json!({ "status": "uninitialized", "model": model })),
        ),
        ServiceState::Failed(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "failed", "model": model, "error": err.to_string() })),
        ),
    }
}
