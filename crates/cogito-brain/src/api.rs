//! HTTP API: commands, queries and the server-sent change feed.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use cogito_types::{
    AnalyzeRequest, CognitiveState, CommandAck, Insight, JournalEvent, KnowledgeEntry, Mode,
    Theory, Thought, ThoughtKind,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::commands::{self, InvalidInput};
use crate::records::{RecordCounts, ThoughtFilter, DEFAULT_THOUGHT_LIMIT, TOP_INSIGHTS};
use crate::scheduler::SchedulerSender;
use crate::MindState;

/// Upper bound for any `limit` query parameter.
const MAX_LIMIT: usize = 500;
const DEFAULT_SEARCH_LIMIT: usize = 50;
const DEFAULT_JOURNAL_LIMIT: usize = 50;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    mind: Arc<MindState>,
    sender: SchedulerSender,
    start_time: std::time::Instant,
}

impl AppState {
    pub fn new(mind: Arc<MindState>, sender: SchedulerSender) -> Self {
        Self {
            mind,
            sender,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Handler error. Bad input maps to 400, everything else to 500.
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<InvalidInput>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    let permissive_cors = state.mind.config.api.permissive_cors;
    let router = Router::new()
        .route("/api/think", post(think))
        .route("/api/learn", post(learn))
        .route("/api/theorize", post(theorize))
        .route("/api/autonomous", post(autonomous))
        .route("/api/stop", post(stop))
        .route("/api/analyze", post(analyze))
        .route("/api/state", get(get_state))
        .route("/api/thoughts", get(list_thoughts))
        .route("/api/theories", get(list_theories))
        .route("/api/insights", get(list_insights))
        .route("/api/knowledge", get(list_knowledge))
        .route("/api/knowledge/search", get(search_knowledge))
        .route("/api/journal", get(list_journal))
        .route("/api/health", get(health))
        .route("/api/events", get(events))
        .with_state(state);

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Serve the API until shutdown is signalled.
pub async fn serve(
    mind: Arc<MindState>,
    sender: SchedulerSender,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", mind.config.api.bind, mind.config.api.port);
    let app = router(AppState::new(mind, sender));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────

async fn think(State(app): State<AppState>) -> ApiResult<CommandAck> {
    Ok(Json(commands::start_thinking(&app.mind, &app.sender).await?))
}

async fn learn(State(app): State<AppState>) -> ApiResult<CommandAck> {
    Ok(Json(commands::start_learning(&app.mind, &app.sender).await?))
}

async fn theorize(State(app): State<AppState>) -> ApiResult<CommandAck> {
    Ok(Json(commands::start_theorizing(&app.mind, &app.sender).await?))
}

async fn autonomous(State(app): State<AppState>) -> ApiResult<CommandAck> {
    Ok(Json(commands::toggle_autonomous(&app.mind, &app.sender).await?))
}

async fn stop(State(app): State<AppState>) -> ApiResult<CommandAck> {
    Ok(Json(commands::stop(&app.mind).await?))
}

async fn analyze(
    State(app): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<CommandAck> {
    Ok(Json(
        commands::deep_analysis(&app.mind, &app.sender, &req.topic).await?,
    ))
}

// ── Queries ─────────────────────────────────────────────────────────

async fn get_state(State(app): State<AppState>) -> ApiResult<CognitiveState> {
    Ok(Json(app.mind.storage.load_state()?))
}

#[derive(Debug, Default, Deserialize)]
struct ThoughtsQuery {
    limit: Option<usize>,
    kind: Option<String>,
    domain: Option<String>,
}

async fn list_thoughts(
    State(app): State<AppState>,
    Query(q): Query<ThoughtsQuery>,
) -> ApiResult<Vec<Thought>> {
    let kind = match q.kind.as_deref().filter(|k| !k.is_empty()) {
        Some(raw) => Some(
            ThoughtKind::parse(raw)
                .ok_or_else(|| InvalidInput(format!("unknown thought kind: {raw}")))?,
        ),
        None => None,
    };
    let filter = ThoughtFilter {
        kind,
        domain: q.domain,
    };
    let limit = clamp_limit(q.limit, DEFAULT_THOUGHT_LIMIT);
    Ok(Json(app.mind.records.thoughts(&filter, limit)?))
}

async fn list_theories(State(app): State<AppState>) -> ApiResult<Vec<Theory>> {
    Ok(Json(app.mind.records.theories()?))
}

async fn list_insights(State(app): State<AppState>) -> ApiResult<Vec<Insight>> {
    Ok(Json(app.mind.records.top_insights(TOP_INSIGHTS)?))
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgeQuery {
    domain: Option<String>,
}

async fn list_knowledge(
    State(app): State<AppState>,
    Query(q): Query<KnowledgeQuery>,
) -> ApiResult<Vec<KnowledgeEntry>> {
    Ok(Json(app.mind.records.knowledge(q.domain.as_deref())?))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: String,
    domain: Option<String>,
    limit: Option<usize>,
}

async fn search_knowledge(
    State(app): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Vec<KnowledgeEntry>> {
    let limit = clamp_limit(q.limit, DEFAULT_SEARCH_LIMIT);
    Ok(Json(app.mind.records.search_knowledge(
        &q.q,
        q.domain.as_deref(),
        limit,
    )?))
}

#[derive(Debug, Default, Deserialize)]
struct JournalQuery {
    limit: Option<usize>,
}

async fn list_journal(
    State(app): State<AppState>,
    Query(q): Query<JournalQuery>,
) -> ApiResult<Vec<JournalEvent>> {
    let limit = clamp_limit(q.limit, DEFAULT_JOURNAL_LIMIT);
    Ok(Json(app.mind.journal.recent_events(limit)?))
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub mode: Mode,
    pub generation: u64,
    pub records: RecordCounts,
    pub feed_subscribers: usize,
    /// Sequence number the next change event will carry.
    pub feed_seq: u64,
}

async fn health(State(app): State<AppState>) -> ApiResult<HealthReport> {
    let state = app.mind.storage.load_state()?;
    Ok(Json(HealthReport {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: app.start_time.elapsed().as_secs(),
        mode: state.mode,
        generation: state.generation,
        records: app.mind.records.counts()?,
        feed_subscribers: app.mind.feed.subscriber_count(),
        feed_seq: app.mind.feed.next_seq(),
    }))
}

// ── Change feed ─────────────────────────────────────────────────────

async fn events(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(app.mind.feed.subscribe()).filter_map(|msg| match msg {
        Ok(change) => Event::default().event("change").json_data(&change).ok().map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "change feed subscriber lagged");
            Some(Ok(Event::default().event("lagged").data(skipped.to_string())))
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Zero or absent means the default page size.
fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    match limit {
        None | Some(0) => default,
        Some(n) => n.min(MAX_LIMIT),
    }
}
