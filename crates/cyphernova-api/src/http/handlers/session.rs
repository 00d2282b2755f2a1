//! Chat session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions                      - Create a session (seed history, sampling overrides)
//! - GET    /api/v1/sessions/{id}                 - Transcript, analytics and theme
//! - DELETE /api/v1/sessions/{id}                 - Drop a session
//! - POST   /api/v1/sessions/{id}/messages        - Run one turn, reply when complete
//! - POST   /api/v1/sessions/{id}/messages/stream - Run one turn as SSE
//! - POST   /api/v1/sessions/{id}/clear           - Start over from the greeting
//! - POST   /api/v1/sessions/{id}/theme           - Toggle light/dark
//! - GET    /api/v1/sessions/{id}/export          - Download the transcript
//!
//! SSE event types:
//! - `text_delta`: incremental text: `{ "text": "..." }`
//! - `error`: the backend failed: `{ "message": "..." }`
//! - `turn`: the appended assistant turn plus updated analytics
//! - `done`: stream complete: `{}`

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use cyphernova_core::export::ExportFormat;
use cyphernova_core::session::{ChatSession, GenerationOverrides, TurnOutcome};
use cyphernova_types::analytics::AnalyticsSummary;
use cyphernova_types::chat::{LegacyMessage, Theme, Turn};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::{AppState, SharedSession};

/// Optional body for session creation.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Messages from older session state to seed the transcript with.
    #[serde(default)]
    pub history: Option<Vec<LegacyMessage>>,
    /// `model`, `temperature` and `max_tokens` for this session only.
    #[serde(flatten)]
    pub generation: GenerationOverrides,
}

/// Body for sending a message.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Body for setting the theme; absent means toggle.
#[derive(Debug, Default, Deserialize)]
pub struct ThemeRequest {
    #[serde(default)]
    pub theme: Option<Theme>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// Full view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub backend: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub theme: Theme,
    pub turns: Vec<Turn>,
    pub analytics: AnalyticsView,
}

/// Analytics with the duration pre-formatted as `H:MM:SS`.
#[derive(Debug, Serialize)]
pub struct AnalyticsView {
    #[serde(flatten)]
    pub summary: AnalyticsSummary,
    pub session_duration_display: String,
}

impl From<AnalyticsSummary> for AnalyticsView {
    fn from(summary: AnalyticsSummary) -> Self {
        Self {
            session_duration_display: summary.duration_display(),
            summary,
        }
    }
}

/// Result of one turn.
#[derive(Debug, Serialize)]
pub struct TurnView {
    pub reply: Turn,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub analytics: AnalyticsView,
}

impl TurnView {
    fn new(outcome: TurnOutcome, summary: AnalyticsSummary) -> Self {
        Self {
            response_time_ms: outcome.response_time.map(|d| d.as_millis() as u64),
            reply: outcome.reply,
            error: outcome.error,
            analytics: summary.into(),
        }
    }
}

fn session_view(session: &ChatSession) -> SessionView {
    SessionView {
        id: session.id(),
        backend: session.gateway().name().to_string(),
        model: session.model_label().to_string(),
        temperature: session.generation().temperature,
        max_tokens: session.generation().max_tokens,
        theme: session.theme(),
        turns: session.transcript().all().to_vec(),
        analytics: session.summary().into(),
    }
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

fn lookup(state: &AppState, raw_id: &str) -> Result<SharedSession, AppError> {
    let id = parse_uuid(raw_id)?;
    state
        .session(&id)
        .ok_or_else(|| AppError::SessionNotFound(raw_id.to_string()))
}

/// Parse an optional JSON body; an empty body yields the default.
fn optional_json<T: Default + for<'de> Deserialize<'de>>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
}

fn require_message(body: &SendMessageRequest) -> Result<(), AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("Message must not be empty".to_string()));
    }
    Ok(())
}

/// POST /api/v1/sessions - Create a session.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let request: CreateSessionRequest = optional_json(&body)?;
    let (id, session) = state
        .create_session(request.history, &request.generation)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let view = session_view(&*session.lock().await);

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("self", format!("/api/v1/sessions/{id}"))
        .with_link("messages", format!("/api/v1/sessions/{id}/messages"));

    Ok(Json(resp))
}

/// GET /api/v1/sessions/{id} - Get a session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let session = lookup(&state, &session_id)?;
    let view = session_view(&*session.lock().await);

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("self", format!("/api/v1/sessions/{session_id}"))
        .with_link("export", format!("/api/v1/sessions/{session_id}/export"));

    Ok(Json(resp))
}

/// DELETE /api/v1/sessions/{id} - Drop a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&session_id)?;
    if !state.remove_session(&id) {
        return Err(AppError::SessionNotFound(session_id));
    }

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(serde_json::json!({"deleted": true}), request_id, elapsed);

    Ok(Json(resp))
}

/// POST /api/v1/sessions/{id}/messages - Run one turn and return the reply.
///
/// Upstream failures are not HTTP errors: they come back as a reply turn
/// with `error: true`.
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<TurnView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    require_message(&body)?;
    let session = lookup(&state, &session_id)?;
    let mut session = session.lock().await;
    let outcome = session.submit(&body.message).await?;
    let view = TurnView::new(outcome, session.summary());

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("session", format!("/api/v1/sessions/{session_id}"));

    Ok(Json(resp))
}

fn sse_event(name: &str, data: &impl Serialize) -> Event {
    let payload = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(name).data(payload)
}

/// POST /api/v1/sessions/{id}/messages/stream - Run one turn as SSE.
///
/// The turn runs on its own task holding the session lock, so it completes
/// and is recorded even if the client goes away mid-stream.
pub async fn stream_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_message(&body)?;
    let session = lookup(&state, &session_id)?;

    let (tx, rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let mut session = session.lock_owned().await;
        let fragments = tx.clone();
        let result = session
            .submit_streaming(&body.message, move |fragment| {
                let _ = fragments.send(sse_event("text_delta", &serde_json::json!({ "text": fragment })));
            })
            .await;

        match result {
            Ok(outcome) => {
                if outcome.error {
                    let _ = tx.send(sse_event(
                        "error",
                        &serde_json::json!({ "message": outcome.reply.content }),
                    ));
                }
                let view = TurnView::new(outcome, session.summary());
                let _ = tx.send(sse_event("turn", &view));
            }
            Err(err) => {
                let _ = tx.send(sse_event("error", &serde_json::json!({ "message": err.to_string() })));
            }
        }
        let _ = tx.send(Event::default().event("done").data("{}"));
    });

    let stream = futures_util::StreamExt::map(UnboundedReceiverStream::new(rx), Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// POST /api/v1/sessions/{id}/clear - Reinstate the greeting and reset analytics.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let session = lookup(&state, &session_id)?;
    let mut session = session.lock().await;
    session.clear();
    let view = session_view(&session);

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}

/// POST /api/v1/sessions/{id}/theme - Toggle, or set with `{"theme": "dark"}`.
pub async fn set_theme(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let request: ThemeRequest = optional_json(&body)?;
    let session = lookup(&state, &session_id)?;
    let mut session = session.lock().await;
    let theme = match request.theme {
        Some(theme) if theme == session.theme() => theme,
        _ => session.toggle_theme(),
    };

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "theme": theme }),
        request_id,
        elapsed,
    )))
}

/// GET /api/v1/sessions/{id}/export?format=text|json - Download the transcript.
pub async fn export_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(AppError::Validation)?,
        None => ExportFormat::default(),
    };

    let session = lookup(&state, &session_id)?;
    let document = session.lock().await.export(format)?;

    let disposition = format!("attachment; filename=\"{}\"", document.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::echo_state;
    use axum::http::StatusCode;

    async fn new_session(state: &AppState) -> String {
        let Json(resp) = create_session(State(state.clone()), Bytes::new()).await.unwrap();
        resp.data.unwrap().id.to_string()
    }

    fn message(text: &str) -> Json<SendMessageRequest> {
        Json(SendMessageRequest {
            message: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_create_session_starts_with_greeting() {
        let state = echo_state();
        let Json(resp) = create_session(State(state.clone()), Bytes::new()).await.unwrap();
        let view = resp.data.unwrap();
        assert_eq!(view.turns.len(), 1);
        assert_eq!(view.turns[0].content, "Hi there!");
        assert_eq!(view.analytics.summary.total_messages, 0);
        assert_eq!(view.backend, "echo");
    }

    #[tokio::test]
    async fn test_create_session_with_generation_overrides() {
        let state = echo_state();
        let body =
            Bytes::from_static(br#"{"model": "echo-2", "temperature": 0.9, "max_tokens": 64}"#);
        let Json(resp) = create_session(State(state.clone()), body).await.unwrap();
        let view = resp.data.unwrap();
        assert_eq!(view.model, "echo-2");
        assert_eq!(view.temperature, 0.9);
        assert_eq!(view.max_tokens, 64);

        let err = create_session(State(state), Bytes::from_static(br#"{"temperature": 3.0}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("temperature")));
    }

    #[tokio::test]
    async fn test_create_session_seeded_history_keeps_greeting_and_counts() {
        let state = echo_state();
        let body = Bytes::from_static(
            br#"{"history": [
                {"role": "user", "content": "question"},
                {"role": "assistant", "content": "answer", "response_time": 1.0, "model": "echo-1"}
            ]}"#,
        );
        let Json(resp) = create_session(State(state), body).await.unwrap();
        let view = resp.data.unwrap();
        assert_eq!(view.turns.len(), 3);
        assert_eq!(view.turns[0].content, "Hi there!");
        assert_eq!(view.analytics.summary.total_messages, 2);
        assert_eq!(view.analytics.summary.models_used, vec!["echo-1"]);
    }

    #[tokio::test]
    async fn test_create_session_rejects_bad_json() {
        let state = echo_state();
        let err = create_session(State(state), Bytes::from_static(b"{not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_send_message_appends_turns() {
        let state = echo_state();
        let id = new_session(&state).await;

        let Json(resp) = send_message(State(state.clone()), Path(id.clone()), message("hello"))
            .await
            .unwrap();
        let turn = resp.data.unwrap();
        assert_eq!(turn.reply.content, "echo: hello");
        assert!(!turn.error);
        assert_eq!(turn.analytics.summary.total_messages, 2);

        let Json(resp) = get_session(State(state), Path(id)).await.unwrap();
        assert_eq!(resp.data.unwrap().turns.len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error_turn_not_http_error() {
        let state = echo_state();
        let id = new_session(&state).await;

        let Json(resp) = send_message(State(state), Path(id), message("please fail"))
            .await
            .unwrap();
        let turn = resp.data.unwrap();
        assert!(turn.error);
        assert!(turn.reply.content.contains("backend unavailable"));
        assert!(turn.response_time_ms.is_none());
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let state = echo_state();
        let id = new_session(&state).await;
        let err = send_message(State(state), Path(id), message("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_ids() {
        let state = echo_state();
        let err = get_session(State(state.clone()), Path(Uuid::now_v7().to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));

        let err = get_session(State(state), Path("nope".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_clear_resets_transcript_and_analytics() {
        let state = echo_state();
        let id = new_session(&state).await;
        send_message(State(state.clone()), Path(id.clone()), message("hello"))
            .await
            .unwrap();

        let Json(resp) = clear_session(State(state), Path(id)).await.unwrap();
        let view = resp.data.unwrap();
        assert_eq!(view.turns.len(), 1);
        assert_eq!(view.analytics.summary.total_messages, 0);
    }

    #[tokio::test]
    async fn test_theme_toggle_and_set() {
        let state = echo_state();
        let id = new_session(&state).await;

        let Json(resp) = set_theme(State(state.clone()), Path(id.clone()), Bytes::new())
            .await
            .unwrap();
        assert_eq!(resp.data.unwrap()["theme"], "dark");

        // Setting the current theme leaves it alone.
        let Json(resp) = set_theme(
            State(state),
            Path(id),
            Bytes::from_static(br#"{"theme":"dark"}"#),
        )
        .await
        .unwrap();
        assert_eq!(resp.data.unwrap()["theme"], "dark");
    }

    #[tokio::test]
    async fn test_export_requires_conversation() {
        let state = echo_state();
        let id = new_session(&state).await;

        let err = export_session(
            State(state.clone()),
            Path(id.clone()),
            Query(ExportQuery { format: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);

        send_message(State(state.clone()), Path(id.clone()), message("hello"))
            .await
            .unwrap();
        let response = export_session(
            State(state),
            Path(id),
            Query(ExportQuery {
                format: Some("json".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_format() {
        let state = echo_state();
        let id = new_session(&state).await;
        let err = export_session(
            State(state),
            Path(id),
            Query(ExportQuery {
                format: Some("pdf".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let state = echo_state();
        let id = new_session(&state).await;
        delete_session(State(state.clone()), Path(id.clone())).await.unwrap();
        let err = delete_session(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_stream_message_records_turn() {
        let state = echo_state();
        let id = new_session(&state).await;

        let _sse = stream_message(State(state.clone()), Path(id.clone()), message("hello there"))
            .await
            .unwrap();

        let uuid: Uuid = id.parse().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let session = state.session(&uuid).unwrap();
        let session = session.lock().await;
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.transcript().all()[2].content, "echo: hello there");
    }
}
