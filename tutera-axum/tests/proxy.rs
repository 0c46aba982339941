use axum::body::Body;
use axum::extract::Json as JsonBody;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tutera_axum::axum;
use tutera_core::TuteraApp;

/// A stand-in for the backend API on an ephemeral port.
async fn spawn_backend() -> String {
    async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
        let h = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        Json(json!({
            "authorization": h("authorization"),
            "cookie": h("cookie"),
            "contentType": h("content-type"),
            "body": body,
        }))
    }

    async fn rejected() -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": "Title is required"}))).into_response()
    }

    async fn login(JsonBody(body): JsonBody<Value>) -> Response {
        if body["password"] != "secret" {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "Invalid credentials"}})))
                .into_response();
        }
        Json(json!({
            "data": {"accessToken": "acc-1", "refreshToken": "ref-1", "tenantName": "acme"}
        }))
        .into_response()
    }

    async fn refresh(JsonBody(body): JsonBody<Value>) -> Json<Value> {
        Json(json!({"accessToken": format!("new-for-{}", body["refreshToken"].as_str().unwrap_or(""))}))
    }

    let backend = Router::new()
        .route("/v1/courses", get(echo).post(echo))
        .route("/v1/courses/rejected", post(rejected))
        .route("/v1/search", get(|uri: axum::http::Uri| async move { uri.query().unwrap_or("").to_string() }))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh))
        .route(
            "/v1/echo/{*rest}",
            get(|uri: axum::http::Uri| async move { Json(json!({"path": uri.path(), "query": uri.query()})) }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, backend).await.unwrap();
    });
    format!("http://{addr}")
}

fn router(backend_url: &str) -> Router {
    let app: TuteraApp<Value, ()> = TuteraApp::new();
    app.set("backend.url", backend_url);
    app.set("backend.timeoutSecs", "5");
    app.set("cookies.domain", ".tutera.app");
    axum(app).use_proxy().unwrap().into_router()
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(res: &Response) -> Vec<String> {
    res.headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn forwards_body_cookie_and_bearer_token() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/courses")
                .header("content-type", "application/json")
                .header("cookie", "accessToken=tok-1")
                .body(Body::from(r#"{"title":"Rust"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["authorization"], "Bearer tok-1");
    assert_eq!(body["cookie"], "accessToken=tok-1");
    assert_eq!(body["contentType"], "application/json");
    assert_eq!(body["body"], r#"{"title":"Rust"}"#);
}

#[tokio::test]
async fn query_string_is_forwarded() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(Request::builder().uri("/api/search?q=rust&page=2").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"q=rust&page=2");
}

#[tokio::test]
async fn backend_errors_are_normalized() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/courses/rejected")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await, json!({"error": "Title is required"}));

    let res = router(&backend)
        .oneshot(Request::builder().uri("/api/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await, json!({"error": "Not Found"}));
}

#[tokio::test]
async fn unreachable_backend_is_500() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let res = router(&format!("http://{addr}"))
        .oneshot(Request::builder().uri("/api/courses").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(res).await["error"].is_string());
}

#[tokio::test]
async fn login_sets_the_three_cookies() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"a@b.c","password":"secret"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert_eq!(cookies.len(), 3);
    assert!(cookies[0].starts_with("accessToken=acc-1;"));
    assert!(cookies[0].contains("HttpOnly") && cookies[0].contains("Domain=.tutera.app"));
    assert!(cookies[0].contains("Max-Age=604800"));
    assert!(cookies[1].starts_with("refreshToken=ref-1;"));
    assert!(cookies[2].starts_with("tenantName=acme;") && !cookies[2].contains("HttpOnly"));
    assert_eq!(json_body(res).await["data"]["accessToken"], "acc-1");
}

#[tokio::test]
async fn failed_login_sets_no_cookies() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"a@b.c","password":"wrong"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&res).is_empty());
    assert_eq!(json_body(res).await, json!({"error": "Invalid credentials"}));
}

#[tokio::test]
async fn refresh_uses_the_cookie_when_body_is_empty() {
    let backend = spawn_backend().await;
    let res = router(&backend)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("cookie", "refreshToken=ref-9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("accessToken=new-for-ref-9;"));
}

#[tokio::test]
async fn logout_clears_cookies_without_backend() {
    let res = router("http://127.0.0.1:9")
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let cookies = set_cookies(&res);
    assert_eq!(cookies.len(), 3);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn encoded_paths_stay_under_v1() {
    let backend = spawn_backend().await;

    let res = router(&backend)
        .oneshot(Request::builder().uri("/api/echo/courses%3Fadmin=1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(res).await, json!({"path": "/v1/echo/courses%3Fadmin=1", "query": null}));

    let res = router(&backend)
        .oneshot(Request::builder().uri("/api/echo/a%2Fb").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(res).await["path"], "/v1/echo/a%2Fb");
}

#[tokio::test]
async fn dot_segments_are_refused() {
    let backend = spawn_backend().await;
    for uri in ["/api/%2e%2e/admin/users", "/api/courses/%2E%2E/%2e%2e/admin", "/api/./courses"] {
        let res = router(&backend)
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("cookie", "accessToken=tok-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json_body(res).await, json!({"error": "Invalid API path"}));
    }
}
