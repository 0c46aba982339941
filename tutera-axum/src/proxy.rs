//! `/api/*` forwarding to the backend API.
//!
//! Calls go to `{backend}/v1/{path}` with the browser's method, query, body,
//! content type and cookies; the access cookie is also sent as a bearer
//! token. Backend errors come back as `{ "error": message }` with the
//! backend's status. The auth endpoints additionally turn returned tokens
//! into cookies.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tutera_core::TuteraConfigSnapshot;

use crate::cookies::{self, CookieOptions, SetCookie};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to the backend base URL.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

/// A finished backend exchange.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &TuteraConfigSnapshot) -> anyhow::Result<Self> {
        let base_url = cfg
            .get_string("backend.url")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        let timeout = cfg.get_u64("backend.timeoutSecs").unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(base_url, Duration::from_secs(timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/v1/{}", self.base_url, path.trim_start_matches('/'));
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        url
    }

    /// Send one request. Only transport failures are errors; any HTTP status
    /// comes back as a response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<BackendResponse, reqwest::Error> {
        let mut req = self.client.request(method, self.url_for(path, query));

        if let Some(ct) = headers.get(header::CONTENT_TYPE) {
            req = req.header(header::CONTENT_TYPE, ct.clone());
        }
        if let Some(cookie) = headers.get(header::COOKIE) {
            req = req.header(header::COOKIE, cookie.clone());
        }
        if let Some(token) = cookies::access_token(headers) {
            req = req.bearer_auth(token);
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        let res = req.send().await?;
        let status = res.status();
        let content_type = res.headers().get(header::CONTENT_TYPE).cloned();
        let body = res.bytes().await?;

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProxyState {
    pub backend: Arc<BackendClient>,
    pub cookies: CookieOptions,
}

impl ProxyState {
    pub fn new(backend: BackendClient, cookies: CookieOptions) -> Self {
        Self {
            backend: Arc::new(backend),
            cookies,
        }
    }

    pub fn from_config(cfg: &TuteraConfigSnapshot) -> anyhow::Result<Self> {
        Ok(Self::new(
            BackendClient::from_config(cfg)?,
            CookieOptions::from_config(cfg),
        ))
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Best-effort message from a backend error body.
pub fn backend_error_message(status: StatusCode, body: Option<&Value>) -> String {
    let from_body = body.and_then(|b| {
        b.get("message")
            .and_then(Value::as_str)
            .or_else(|| b.get("error").and_then(Value::as_str))
            .or_else(|| b.pointer("/error/message").and_then(Value::as_str))
    });

    from_body
        .map(str::to_string)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Request failed".to_string())
}

fn mirror(res: BackendResponse) -> Response {
    if !res.status.is_success() {
        let message = backend_error_message(res.status, res.json().as_ref());
        tracing::debug!(status = %res.status, %message, "backend returned an error");
        return error_response(res.status, message);
    }

    let content_type = res
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    (res.status, [(header::CONTENT_TYPE, content_type)], res.body).into_response()
}

fn transport_failure(path: &str, e: &reqwest::Error) -> Response {
    tracing::warn!(path, error = %e, "backend request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to reach the backend API")
}

/// The backend path for a request path under `/api/`, still
/// percent-encoded so `%2F` and `%3F` stay inside their segment. Dot
/// segments (plain or encoded) are refused.
pub fn backend_path(request_path: &str) -> Option<&str> {
    let path = request_path.strip_prefix("/api/")?;
    let escapes = path.split('/').any(|segment| {
        let decoded = urlencoding::decode(segment).map(|d| d.into_owned()).unwrap_or_default();
        decoded == "." || decoded == ".."
    });
    if path.is_empty() || escapes {
        return None;
    }
    Some(path)
}

async fn forward(
    State(state): State<ProxyState>,
    uri: Uri,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path) = backend_path(uri.path()) else {
        tracing::debug!(path = uri.path(), "refusing to forward path outside the API");
        return error_response(StatusCode::BAD_REQUEST, "Invalid API path");
    };

    match state
        .backend
        .send(method, path, query.as_deref(), &headers, body)
        .await
    {
        Ok(res) => mirror(res),
        Err(e) => transport_failure(path, &e),
    }
}

fn token_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .or_else(|| body.get("data").and_then(|d| d.get(key)))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` headers for the tokens found in an auth response body.
pub fn auth_cookies(body: &Value, opts: &CookieOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(t) = token_field(body, cookies::ACCESS_TOKEN) {
        SetCookie::new(cookies::ACCESS_TOKEN, t, cookies::TOKEN_MAX_AGE).append_to(&mut headers, opts);
    }
    if let Some(t) = token_field(body, cookies::REFRESH_TOKEN) {
        SetCookie::new(cookies::REFRESH_TOKEN, t, cookies::TOKEN_MAX_AGE).append_to(&mut headers, opts);
    }
    if let Some(t) = token_field(body, cookies::TENANT_NAME) {
        SetCookie::new(cookies::TENANT_NAME, t, cookies::TENANT_NAME_MAX_AGE)
            .script_readable()
            .append_to(&mut headers, opts);
    }
    headers
}

async fn auth_exchange(state: &ProxyState, path: &str, headers: &HeaderMap, body: Bytes) -> Response {
    let res = match state
        .backend
        .send(Method::POST, path, None, headers, body)
        .await
    {
        Ok(res) => res,
        Err(e) => return transport_failure(path, &e),
    };

    if !res.status.is_success() {
        return mirror(res);
    }

    let Some(json) = res.json() else {
        return mirror(res);
    };
    let set_cookies = auth_cookies(&json, &state.cookies);
    tracing::debug!(path, cookies = set_cookies.len(), "auth tokens stored in cookies");
    (res.status, set_cookies, Json(json)).into_response()
}

async fn login(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> Response {
    auth_exchange(&state, "auth/login", &headers, body).await
}

async fn verify_otp(State(state): State<ProxyState>, headers: HeaderMap, body: Bytes) -> Response {
    auth_exchange(&state, "auth/verify-otp", &headers, body).await
}

async fn refresh(State(state): State<ProxyState>, mut headers: HeaderMap, body: Bytes) -> Response {
    let body = if body.is_empty() {
        match cookies::cookie_value(&headers, cookies::REFRESH_TOKEN).filter(|t| !t.is_empty()) {
            Some(token) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Bytes::from(json!({ "refreshToken": token }).to_string())
            }
            None => body,
        }
    } else {
        body
    };
    auth_exchange(&state, "auth/refresh", &headers, body).await
}

async fn logout(State(state): State<ProxyState>) -> Response {
    let mut headers = HeaderMap::new();
    for name in [cookies::ACCESS_TOKEN, cookies::REFRESH_TOKEN, cookies::TENANT_NAME] {
        let cookie = SetCookie::removal(name);
        let cookie = if name == cookies::TENANT_NAME {
            cookie.script_readable()
        } else {
            cookie
        };
        cookie.append_to(&mut headers, &state.cookies);
    }
    (StatusCode::OK, headers, Json(json!({ "success": true }))).into_response()
}

/// Routes under `/api`: the auth endpoints plus a catch-all forwarder.
/// More specific `/api/...` routes merged next to these take precedence.
pub fn proxy_router(state: ProxyState) -> Router<()> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify-otp", post(verify_otp))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/{*path}", any(forward))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_sources_in_order() {
        let s = StatusCode::BAD_REQUEST;
        assert_eq!(backend_error_message(s, Some(&json!({"message": "m", "error": "e"}))), "m");
        assert_eq!(backend_error_message(s, Some(&json!({"error": "e"}))), "e");
        assert_eq!(backend_error_message(s, Some(&json!({"error": {"message": "nested"}}))), "nested");
        assert_eq!(backend_error_message(s, Some(&json!({"other": 1}))), "Bad Request");
        assert_eq!(backend_error_message(s, None), "Bad Request");
    }

    #[test]
    fn url_joins_path_and_query() {
        let c = BackendClient::new("http://api.test/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.url_for("courses/1", Some("a=b")), "http://api.test/v1/courses/1?a=b");
        assert_eq!(c.url_for("/courses", None), "http://api.test/v1/courses");
    }

    #[test]
    fn backend_path_keeps_encoding_and_refuses_dot_segments() {
        assert_eq!(backend_path("/api/courses/1"), Some("courses/1"));
        assert_eq!(backend_path("/api/a%2Fb"), Some("a%2Fb"));
        assert_eq!(backend_path("/api/courses%3Fadmin=1"), Some("courses%3Fadmin=1"));
        for bad in ["/api/../admin", "/api/%2e%2e/admin", "/api/a/%2E/b", "/api/", "/other/x"] {
            assert_eq!(backend_path(bad), None, "{bad}");
        }
    }

    #[test]
    fn tokens_are_found_under_data() {
        let body = json!({"data": {"accessToken": "a", "refreshToken": "r"}, "tenantName": "acme"});
        let h = auth_cookies(&body, &CookieOptions::default());
        let values: Vec<_> = h
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 3);
        assert!(values[0].starts_with("accessToken=a;") && values[0].contains("HttpOnly"));
        assert!(values[1].starts_with("refreshToken=r;"));
        assert!(values[2].starts_with("tenantName=acme;") && !values[2].contains("HttpOnly"));
    }
}
