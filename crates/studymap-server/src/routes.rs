use async_stream::stream;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, post},
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use studymap_api::{
    ApiError, AppEventPayload, ChapterRequest, DetailDto, NodeRequest, TopicRequest,
    VisualizerStateDto,
};
use studymap_app::VisualizerController;
use studymap_content::{
    ContentError, ContentSource, MathSolverClient, SolveRequest, SolveResponse, SolverError,
};
use studymap_core::{SyllabusData, TopicContent};
use studymap_graph::GraphSnapshot;
use tokio::sync::broadcast;
use tracing::warn;

pub struct ServerState {
    pub controller: VisualizerController,
    pub source: Arc<dyn ContentSource>,
    pub math: Option<MathSolverClient>,
    pub events_tx: broadcast::Sender<AppEventPayload>,
}

#[derive(Debug)]
struct HttpError(ApiError);

type ApiResult<T> = Result<Json<T>, HttpError>;

impl From<ApiError> for HttpError {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.0.code.as_str() {
            "invalid_argument" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" | "cancelled" => StatusCode::CONFLICT,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self.0)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: Arc<ServerState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/events", get(events_stream))
        .route("/generate-topic-content", post(generate_topic_content))
        .route("/whiteboard/calculate", post(whiteboard_calculate))
        .route("/visualizer/syllabus", post(submit_syllabus))
        .route("/visualizer/sample-syllabus", get(sample_syllabus))
        .route("/visualizer/chapter", post(select_chapter))
        .route("/visualizer/state", get(visualizer_state))
        .route("/visualizer/graph", get(graph))
        .route("/visualizer/expand", post(expand))
        .route("/visualizer/collapse", post(collapse))
        .route("/visualizer/select", post(select))
        .route("/visualizer/close-detail", post(close_detail))
        .route("/visualizer/reset", post(reset))
        .route("/visualizer/detail", get(detail));

    Router::new().nest("/api", api_routes).with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn events_stream(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let mut rx = state.events_tx.subscribe();
    let stream = stream! {
        loop {
            match rx.recv().await {
                Ok(event_payload) => {
                    let data = serde_json::to_string(&event_payload).unwrap_or_else(|_| {
                        "{\"type\":\"StatusUpdate\",\"data\":{\"message\":\"serialization_error\"}}".to_string()
                    });
                    yield Ok::<Event, Infallible>(Event::default().event("app_event").data(data));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn generate_topic_content(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<TopicRequest>,
) -> ApiResult<TopicContent> {
    let topic = req
        .topic()
        .ok_or_else(|| ApiError::invalid_argument("Topic is required"))?;
    state
        .source
        .generate(topic)
        .await
        .map(Json)
        .map_err(|err| match err {
            ContentError::MissingTopic => {
                HttpError(ApiError::invalid_argument("Topic is required"))
            }
            other => {
                warn!(topic, error = %other, "topic content generation failed");
                HttpError(ApiError::internal("Failed to generate topic content"))
            }
        })
}

async fn whiteboard_calculate(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SolveRequest>,
) -> ApiResult<SolveResponse> {
    let client = state
        .math
        .as_ref()
        .ok_or_else(|| ApiError::unavailable(SolverError::NotConfigured.to_string()))?;
    client.solve(&req).await.map(Json).map_err(|err| {
        warn!(error = %err, "whiteboard calculation failed");
        match err {
            SolverError::NotConfigured | SolverError::Transport(_) => {
                HttpError(ApiError::unavailable(err.to_string()))
            }
            SolverError::Status(_) | SolverError::Parse(_) => {
                HttpError(ApiError::internal(err.to_string()))
            }
        }
    })
}

async fn submit_syllabus(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<SyllabusData>,
) -> ApiResult<SyllabusData> {
    state
        .controller
        .submit_syllabus(req)
        .await
        .map(Json)
        .map_err(Into::into)
}

async fn sample_syllabus() -> Json<SyllabusData> {
    Json(SyllabusData::sample())
}

async fn select_chapter(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ChapterRequest>,
) -> ApiResult<VisualizerStateDto> {
    state
        .controller
        .select_chapter(req.subject_index, req.chapter_index)
        .await?;
    Ok(Json(state.controller.state()))
}

async fn visualizer_state(State(state): State<Arc<ServerState>>) -> Json<VisualizerStateDto> {
    Json(state.controller.state())
}

async fn graph(State(state): State<Arc<ServerState>>) -> Json<GraphSnapshot> {
    Json(GraphSnapshot::clone(&state.controller.graph()))
}

async fn expand(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<NodeRequest>,
) -> ApiResult<VisualizerStateDto> {
    state.controller.expand(req.node_id).await?;
    Ok(Json(state.controller.state()))
}

async fn collapse(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<NodeRequest>,
) -> ApiResult<VisualizerStateDto> {
    state.controller.collapse(req.node_id).await?;
    Ok(Json(state.controller.state()))
}

async fn select(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<NodeRequest>,
) -> ApiResult<VisualizerStateDto> {
    state.controller.select(req.node_id).await?;
    Ok(Json(state.controller.state()))
}

async fn close_detail(State(state): State<Arc<ServerState>>) -> ApiResult<VisualizerStateDto> {
    state.controller.close_detail().await?;
    Ok(Json(state.controller.state()))
}

async fn reset(State(state): State<Arc<ServerState>>) -> ApiResult<VisualizerStateDto> {
    state.controller.reset().await?;
    Ok(Json(state.controller.state()))
}

async fn detail(State(state): State<Arc<ServerState>>) -> Json<Option<DetailDto>> {
    Json(state.controller.detail())
}
