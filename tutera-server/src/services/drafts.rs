//! Authoring endpoints over a session's draft store.
//!
//! Everything here works on the session named by `x-session-id` or the
//! `tutera_session` cookie, in the tenant resolved from the request.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tutera_axum::cookies::{cookie_value, CookieOptions, SetCookie, DRAFT_SESSION};
use tutera_axum::rest::{map_json_rejection, tenant_from_headers};
use tutera_axum::{EdgeConfig, TuteraAxumError};
use tutera_core::{CourseDraft, DraftSnapshot, TuteraConfigSnapshot, TuteraError, WizardEvent};
use uuid::Uuid;

use super::{resolve_session, DraftSession, DraftSessions, SESSION_ID_HEADER};

const SESSION_MAX_AGE: i64 = 30 * 24 * 60 * 60;

#[derive(Clone)]
pub struct DraftsState {
    pub sessions: Arc<DraftSessions>,
    pub root_domain: Arc<str>,
    pub cookies: CookieOptions,
}

impl DraftsState {
    pub fn new(sessions: Arc<DraftSessions>, cfg: &TuteraConfigSnapshot) -> Self {
        Self {
            sessions,
            root_domain: EdgeConfig::from_config(cfg).root_domain.into(),
            cookies: CookieOptions::from_config(cfg),
        }
    }

    async fn open(&self, headers: &HeaderMap) -> Result<Arc<DraftSession>, TuteraAxumError> {
        let tenant = tenant_from_headers(headers, &self.root_domain);
        let header = headers.get(SESSION_ID_HEADER).and_then(|v| v.to_str().ok());
        let session = resolve_session(header, cookie_value(headers, DRAFT_SESSION))?;
        Ok(self.sessions.open(&tenant, &session).await?)
    }
}

type Snapshot = Result<Json<DraftSnapshot>, TuteraAxumError>;

async fn new_session(State(state): State<DraftsState>) -> Response {
    let id = Uuid::new_v4().to_string();
    let mut headers = HeaderMap::new();
    SetCookie::new(DRAFT_SESSION, id.as_str(), SESSION_MAX_AGE).append_to(&mut headers, &state.cookies);
    (StatusCode::CREATED, headers, Json(json!({"sessionId": id}))).into_response()
}

async fn snapshot(State(state): State<DraftsState>, headers: HeaderMap) -> Snapshot {
    let session = state.open(&headers).await?;
    let store = session.lock().await;
    Ok(Json(store.snapshot()))
}

async fn update_current(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<CourseDraft>, JsonRejection>,
) -> Snapshot {
    let Json(patch) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    store.update_current_course(patch);
    Ok(Json(store.snapshot()))
}

async fn autosave(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<CourseDraft>, JsonRejection>,
) -> Result<StatusCode, TuteraAxumError> {
    let Json(patch) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    session.autosave().queue(patch)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct StepBody {
    step: u8,
}

async fn set_step(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<StepBody>, JsonRejection>,
) -> Snapshot {
    let Json(StepBody { step }) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    store.set_current_step(step).map_err(TuteraError::from)?;
    Ok(Json(store.snapshot()))
}

async fn dispatch(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<WizardEvent>, JsonRejection>,
) -> Snapshot {
    let Json(event) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    store.dispatch(event)?;
    Ok(Json(store.snapshot()))
}

async fn reset(State(state): State<DraftsState>, headers: HeaderMap) -> Snapshot {
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    store.reset_current_course();
    Ok(Json(store.snapshot()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagsBody {
    show_preview: Option<bool>,
    show_quiz: Option<bool>,
}

async fn set_flags(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<FlagsBody>, JsonRejection>,
) -> Snapshot {
    let Json(flags) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    if let Some(show) = flags.show_preview {
        store.set_show_preview(show);
    }
    if let Some(show) = flags.show_quiz {
        store.set_show_quiz(show);
    }
    Ok(Json(store.snapshot()))
}

/// Landing-page customization progress and the signed-in identity.
/// An empty string clears a text field.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferencesBody {
    #[serde(default)]
    user_role: Option<String>,
    #[serde(default)]
    tenant_name: Option<String>,
    #[serde(default)]
    customization_step: Option<u8>,
}

async fn get_preferences(
    State(state): State<DraftsState>,
    headers: HeaderMap,
) -> Result<Json<PreferencesBody>, TuteraAxumError> {
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    let prefs = store.preferences();
    Ok(Json(PreferencesBody {
        user_role: prefs.user_role().map_err(TuteraError::from)?,
        tenant_name: prefs.tenant_name().map_err(TuteraError::from)?,
        customization_step: Some(prefs.customization_step().map_err(TuteraError::from)?),
    }))
}

async fn put_preferences(
    State(state): State<DraftsState>,
    headers: HeaderMap,
    body: Result<Json<PreferencesBody>, JsonRejection>,
) -> Result<StatusCode, TuteraAxumError> {
    let Json(body) = body.map_err(map_json_rejection)?;
    let session = state.open(&headers).await?;
    let mut store = session.lock().await;
    let mut prefs = store.preferences();

    let text = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    if body.user_role.is_some() {
        prefs.set_user_role(text(&body.user_role).as_deref()).map_err(TuteraError::from)?;
    }
    if body.tenant_name.is_some() {
        prefs.set_tenant_name(text(&body.tenant_name).as_deref()).map_err(TuteraError::from)?;
    }
    if let Some(step) = body.customization_step {
        prefs.set_customization_step(step).map_err(TuteraError::from)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn drafts_router(state: DraftsState) -> Router<()> {
    Router::new()
        .route("/api/drafts", get(snapshot))
        .route("/api/drafts/session", post(new_session))
        .route("/api/drafts/current", patch(update_current))
        .route("/api/drafts/current/autosave", post(autosave))
        .route("/api/drafts/step", put(set_step))
        .route("/api/drafts/events", post(dispatch))
        .route("/api/drafts/reset", post(reset))
        .route("/api/drafts/flags", put(set_flags))
        .route("/api/drafts/preferences", get(get_preferences).put(put_preferences))
        .with_state(state)
}
