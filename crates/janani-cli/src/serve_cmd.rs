use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use janani_core::context::{
    ContextPatch, ContextStore, ConversationContext, InMemoryContextStore, MessageRole,
};
use janani_core::language::Language;
use janani_core::llm;
use janani_core::schedule::{self, ScheduleLookup, TestRecord};
use janani_core::screening::{ReplySource, TestScreening, extract_week};
use janani_core::voice::twiml::VoiceResponse;
use janani_core::voice::{CallTurn, VoiceAdapter};

use crate::config::JananiConfig;

/// Used when a text-API request names no caller.
pub const DEFAULT_USER_ID: &str = "default_user";

/// Twilio `CallStatus` values after which the call is over.
const TERMINAL_CALL_STATUSES: &[&str] = &["completed", "busy", "failed", "no-answer", "canceled"];

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error from a JSON endpoint.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Error from a voice webhook.
///
/// The provider expects a document no matter what, so this renders as a
/// 200 apology that ends the call.
#[derive(Debug)]
pub struct VoiceError {
    language: Language,
    message: String,
}

impl VoiceError {
    fn new(language: Language, message: impl Into<String>) -> Self {
        Self {
            language,
            message: message.into(),
        }
    }
}

impl From<FormRejection> for VoiceError {
    fn from(rejection: FormRejection) -> Self {
        Self::new(Language::default(), rejection.body_text())
    }
}

impl From<QueryRejection> for VoiceError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(Language::default(), rejection.body_text())
    }
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.message, "voice webhook failed, apologizing");
        twiml(VoiceAdapter::new().apology(self.language))
    }
}

fn twiml(doc: VoiceResponse) -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, "text/xml")], doc.to_xml()).into_response()
}

/// Panic handler for the voice routes: the call still gets a document.
fn voice_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "voice handler panicked, apologizing");
    twiml(VoiceAdapter::new().apology(Language::default()))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pregnancy_week: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub source: ReplySource,
    pub context: ConversationContext,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

impl UserQuery {
    fn user_id(self) -> String {
        self.user_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub week: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct WeekScheduleResponse {
    #[serde(flatten)]
    pub lookup: ScheduleLookup,
    pub upcoming: Vec<&'static TestRecord>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingQuery {
    pub language: Option<String>,
}

/// The subset of Twilio's webhook parameters the voice line reads.
#[derive(Debug, Default, Deserialize)]
pub struct VoiceForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence")]
    pub confidence: Option<String>,
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

impl VoiceForm {
    fn call_sid(&self, language: Language) -> Result<&str, VoiceError> {
        self.call_sid
            .as_deref()
            .filter(|sid| !sid.trim().is_empty())
            .ok_or_else(|| VoiceError::new(language, "missing CallSid"))
    }

    /// Unparseable confidence counts as missing.
    fn confidence(&self) -> Option<f32> {
        self.confidence.as_deref()?.trim().parse().ok()
    }
}

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContextStore>,
    pub screening: Arc<TestScreening>,
    pub voice: VoiceAdapter,
}

impl AppState {
    pub fn new(store: Arc<dyn ContextStore>, screening: Arc<TestScreening>) -> Self {
        Self {
            store,
            screening,
            voice: VoiceAdapter::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/context", get(get_context).post(update_context))
        .route("/api/context/reset", post(reset_context))
        .route("/api/schedule", get(get_schedule))
        .merge(voice_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn voice_routes() -> Router<AppState> {
    Router::new()
        .route("/voice/incoming", post(voice_incoming))
        .route("/voice/language", post(voice_language))
        .route("/voice/set-language", post(voice_set_language))
        .route("/voice/process", post(voice_process))
        .route("/voice/continue", post(voice_continue))
        .route("/voice/status", post(voice_status))
        .layer(CatchPanicLayer::custom(voice_panic))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(config: JananiConfig) -> Result<()> {
    let generator = llm::from_config(&config.llm).context("failed to set up text generation")?;
    let store = Arc::new(InMemoryContextStore::new(&config.store));
    let state = AppState::new(store.clone(), Arc::new(TestScreening::new(generator)));
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(run_sweeper(
        store,
        config.store.sweep_interval,
        shutdown.clone(),
    ));

    tracing::info!(
        ttl_secs = config.store.ttl.as_secs(),
        "janani serve listening on http://{addr}"
    );
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "context sweeper ended abnormally");
    }
    served?;
    tracing::info!("janani serve shut down");
    Ok(())
}

/// Resolves on Ctrl+C or when `token` is cancelled elsewhere.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                // Without a signal handler, only cancellation can stop us.
                token.cancelled().await;
            }
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}

/// Periodically drop idle contexts until `cancel` fires.
pub async fn run_sweeper(store: Arc<dyn ContextStore>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                store.evict_expired().await;
            }
        }
    }
    tracing::debug!("context sweeper stopped");
}

// ---------------------------------------------------------------------------
// Text API handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "janani",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn parse_language(raw: &str) -> Result<Language, AppError> {
    raw.parse::<Language>()
        .map_err(|e| AppError::bad_request(e.to_string()))
}

/// Fill in the week from what the caller said, unless it is already known.
fn learn_week(ctx: &mut ConversationContext, utterance: &str) {
    if ctx.pregnancy_week.is_some() {
        return;
    }
    if let Some(week) = extract_week(utterance) {
        tracing::debug!(week, "pregnancy week taken from message");
        ctx.set_week(week);
    }
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ChatRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid request body: {e}")))?
    };

    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Missing required field: message"))?;
    let patch = ContextPatch {
        pregnancy_week: request.pregnancy_week,
        language: request.language.as_deref().map(parse_language).transpose()?,
        name: request.name,
    };
    let user_id = UserQuery {
        user_id: request.user_id,
    }
    .user_id();

    // The lease is held for the whole turn so one caller's turns apply in order.
    let mut ctx = state.store.lease(&user_id).await;
    ctx.apply(&patch);
    learn_week(&mut ctx, &message);
    let snapshot = ctx.snapshot();
    let reply = state.screening.handle(&message, &snapshot).await;
    drop(ctx);

    tracing::info!(user_id = %user_id, source = ?reply.source, "chat reply");
    Ok(Json(ChatResponse {
        response: reply.text,
        source: reply.source,
        context: snapshot,
        user_id,
    })
    .into_response())
}

async fn get_context(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Response, AppError> {
    let user_id = query.user_id();
    let context = match state.store.get(&user_id).await {
        Some(ctx) => serde_json::to_value(&ctx).map_err(|e| AppError::internal(e.into()))?,
        None => serde_json::json!({}),
    };
    Ok(Json(serde_json::json!({ "user_id": user_id, "context": context })).into_response())
}

async fn update_context(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    let patch: ContextPatch = if body.iter().all(u8::is_ascii_whitespace) {
        ContextPatch::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid context: {e}")))?
    };
    if patch.is_empty() {
        return Err(AppError::bad_request("No data provided"));
    }

    let user_id = query.user_id();
    let mut ctx = state.store.lease(&user_id).await;
    ctx.apply(&patch);
    let snapshot = ctx.snapshot();
    drop(ctx);

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "context": serde_json::to_value(&snapshot).map_err(|e| AppError::internal(e.into()))?,
        "message": "Context updated",
    }))
    .into_response())
}

async fn reset_context(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<serde_json::Value> {
    let user_id = query.user_id();
    state.store.remove(&user_id).await;
    Json(serde_json::json!({ "message": format!("Context reset for user {user_id}") }))
}

async fn get_schedule(
    query: Result<Query<ScheduleQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    match query.week {
        None => Ok(Json(schedule::all_schedules()).into_response()),
        Some(0) => Err(AppError::bad_request("week must be at least 1")),
        Some(week) => Ok(Json(WeekScheduleResponse {
            lookup: schedule::tests_for(week),
            upcoming: schedule::upcoming_tests(week),
        })
        .into_response()),
    }
}

// ---------------------------------------------------------------------------
// Voice handlers
// ---------------------------------------------------------------------------

async fn voice_incoming(
    State(state): State<AppState>,
    query: Result<Query<IncomingQuery>, QueryRejection>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Result<Response, VoiceError> {
    let Query(query) = query?;
    let Form(form) = form?;
    let requested = query.language.as_deref().and_then(|raw| {
        raw.parse::<Language>()
            .inspect_err(|e| tracing::warn!(error = %e, "ignoring language parameter"))
            .ok()
    });
    let call_sid = form.call_sid(requested.unwrap_or_default())?;

    let mut ctx = state.store.lease(call_sid).await;
    if let Some(language) = requested {
        ctx.language = language;
    }
    if ctx.created() {
        tracing::info!(call_sid, language = %ctx.language, "incoming call");
    }
    Ok(twiml(state.voice.welcome(ctx.language)))
}

async fn voice_language(State(state): State<AppState>) -> Response {
    twiml(state.voice.language_menu())
}

async fn voice_set_language(
    State(state): State<AppState>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Result<Response, VoiceError> {
    let Form(form) = form?;
    let language = Language::from_digit(form.digits.as_deref().unwrap_or_default());
    let call_sid = form.call_sid(language)?;

    let mut ctx = state.store.lease(call_sid).await;
    ctx.language = language;
    tracing::debug!(call_sid, %language, "caller chose language");
    Ok(twiml(state.voice.language_selected(language)))
}

async fn voice_process(
    State(state): State<AppState>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Result<Response, VoiceError> {
    let Form(form) = form?;
    let call_sid = form.call_sid(Language::default())?;

    let mut ctx = state.store.lease(call_sid).await;
    let language = ctx.language;
    let utterance = match CallTurn::classify(form.speech_result.as_deref(), form.confidence()) {
        CallTurn::Repeat => {
            tracing::debug!(call_sid, confidence = ?form.confidence(), "speech not understood");
            return Ok(twiml(state.voice.ask_to_repeat(language)));
        }
        CallTurn::Answer(utterance) => utterance,
    };

    learn_week(&mut ctx, &utterance);
    let snapshot = ctx.snapshot();
    let reply = state.screening.handle(&utterance, &snapshot).await;
    ctx.push_message(MessageRole::User, utterance);
    ctx.push_message(MessageRole::Assistant, reply.text.clone());

    tracing::info!(call_sid, source = ?reply.source, "voice reply");
    Ok(twiml(state.voice.speak_reply(&reply.text, language)))
}

async fn voice_continue(
    State(state): State<AppState>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Result<Response, VoiceError> {
    let Form(form) = form?;
    let mut language = Language::default();
    if let Some(call_sid) = form.call_sid.as_deref() {
        if let Some(ctx) = state.store.get(call_sid).await {
            language = ctx.language;
        }
        state.store.remove(call_sid).await;
    }
    Ok(twiml(state.voice.goodbye(language)))
}

async fn voice_status(
    State(state): State<AppState>,
    form: Result<Form<VoiceForm>, FormRejection>,
) -> Result<Response, VoiceError> {
    let Form(form) = form?;
    let status = form.call_status.as_deref().unwrap_or_default();
    if let Some(call_sid) = form.call_sid.as_deref() {
        if TERMINAL_CALL_STATUSES.contains(&status) && state.store.remove(call_sid).await {
            tracing::info!(call_sid, status, "call ended, context dropped");
        }
    }
    Ok(twiml(VoiceResponse::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
