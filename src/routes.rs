// src/routes.rs
use std::{path::Path, sync::Arc, time::Duration};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::error::{ApiError, InvalidInput};
use crate::ledger::Ledger;
use crate::loot;
use crate::scan::ScanProxy;
use crate::session::{self, attach_identity, require_session, SessionGate};
use crate::types::{Coordinate, LoginForm, LootStash, SignalRecord, StatusRes};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub scanner: Arc<ScanProxy>,
    pub sessions: Arc<SessionGate>,
    pub map: Arc<MapSettings>,
    pub loot_max: usize,
}

#[derive(Debug, Default)]
pub struct MapSettings {
    pub token: Option<String>,
    pub style: Option<String>,
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(map_page))
        .route("/map", get(map_page))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout).post(logout))
        .route("/health", get(health))
        .route("/api/scan", post(scan_area))
        .route("/api/distress", get(list_signals).post(submit_signal))
        .route("/api/signal", post(submit_signal))
        .route("/api/signals", get(list_signals))
        .route("/api/gemini", post(chat))
        .route("/api/loot", post(spawn_loot))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

// ---------- PAGES ---------- //

async fn map_page(
    State(st): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let session = require_session(st.sessions.resolve(&headers))?;
    Ok(Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Beacon</title></head>
<body data-mapbox-token="{token}" data-mapbox-style="{style}" data-operator="{user}">
<div id="map"></div>
<script src="/static/script.js"></script>
</body>
</html>
"#,
        token = escape(st.map.token.as_deref().unwrap_or_default()),
        style = escape(st.map.style.as_deref().unwrap_or_default()),
        user = escape(&session.identity),
    )))
}

async fn login_page() -> Html<String> {
    Html(login_form(None))
}

async fn login(
    State(st): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    // a browser logging in again gives up the session it already holds
    st.sessions.close(&headers);
    match st.sessions.open(&form.username) {
        Some(cookie) => (
            StatusCode::SEE_OTHER,
            [
                (header::LOCATION, "/".to_string()),
                (header::SET_COOKIE, session::set_cookie(&cookie)),
            ],
        )
            .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Html(login_form(Some("Callsign must be 1-64 characters."))),
        )
            .into_response(),
    }
}

async fn logout(State(st): State<AppState>, headers: HeaderMap) -> Response {
    st.sessions.close(&headers);
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/login".to_string()),
            (header::SET_COOKIE, session::clear_cookie()),
        ],
    )
        .into_response()
}

fn login_form(error: Option<&str>) -> String {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", escape(e)))
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Beacon login</title></head>
<body>
{error}<form method="post" action="/login">
<input name="username" placeholder="callsign" maxlength="64" autofocus>
<button type="submit">CONNECT</button>
</form>
</body>
</html>
"#
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ---------- API HANDLERS ---------- //

async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

async fn scan_area(
    State(st): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusRes>, ApiError> {
    let coord = Coordinate::from_json(&json_body(body)?)?;
    let report = st.scanner.scan(coord).await?;
    Ok(Json(StatusRes::success(report.message)))
}

async fn submit_signal(
    State(st): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusRes>, ApiError> {
    let record = SignalRecord::from_json(json_body(body)?)?;
    let session = st.sessions.resolve(&headers);
    let record = attach_identity(record, session.as_ref());
    let (lat, lng) = (record.lat, record.lng);
    st.ledger.append(record).await?;
    info!(
        lat,
        lng,
        user = session.as_ref().map(|s| s.identity.as_str()),
        "distress signal stored"
    );
    Ok(Json(StatusRes::success("DISTRESS SIGNAL BROADCASTED GLOBALLY.")))
}

async fn list_signals(State(st): State<AppState>) -> Json<Vec<SignalRecord>> {
    Json(st.ledger.list_all().await)
}

async fn chat(
    State(st): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let message = match body.get("message") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err(InvalidInput::Missing("message").into())
        }
        Some(_) => return Err(InvalidInput::NotText("message").into()),
    };
    Ok(Json(st.scanner.chat(message).await?))
}

async fn spawn_loot(
    State(st): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<LootStash>>, ApiError> {
    let body = json_body(body)?;
    let center = Coordinate::from_json(&body)?;
    let count = match body.get("count") {
        None | Some(Value::Null) => loot::DEFAULT_COUNT,
        Some(v) => v.as_u64().ok_or(InvalidInput::NotNumeric("count"))? as usize,
    };
    Ok(Json(loot::spawn_loot(center, count.clamp(1, st.loot_max))))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, InvalidInput> {
    body.map(|Json(v)| v).map_err(|_| InvalidInput::Malformed)
}
