use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use tutera_server::{build_from, default_app};

fn router() -> Router {
    let app = default_app();
    app.set("edge.rootDomain", "tutera.app");
    build_from(app).unwrap().into_router()
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn call(method: &str, uri: &str, session: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(s) = session {
        b = b.header("x-session-id", s);
    }
    match body {
        Some(v) => b
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => b.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

#[tokio::test]
async fn health_ok() {
    let res = send(&router(), call("GET", "/health", None, None)).await;

    assert_eq!(res.status().as_u16(), 200);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), "ok");
}

#[tokio::test]
async fn new_session_sets_cookie_that_later_calls_use() {
    let router = router();
    let res = send(&router, call("POST", "/api/drafts/session", None, None)).await;

    assert_eq!(res.status().as_u16(), 201);
    let cookie = res.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with("tutera_session=") && cookie.contains("HttpOnly"));
    let id = json_body(res).await["sessionId"].as_str().unwrap().to_string();
    assert!(cookie.contains(&id));

    let req = Request::builder()
        .uri("/api/drafts")
        .header("cookie", format!("tutera_session={id}"))
        .body(Body::empty())
        .unwrap();
    let res = send(&router, req).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(
        json_body(res).await,
        json!({
            "courses": [],
            "currentCourse": null,
            "currentStep": 0,
            "showPreview": false,
            "showQuiz": false
        })
    );
}

#[tokio::test]
async fn missing_or_bad_session_is_400() {
    let router = router();

    let res = send(&router, call("GET", "/api/drafts", None, None)).await;
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "BadRequest");

    let res = send(&router, call("GET", "/api/drafts/courses", Some("no/slashes"), None)).await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn wizard_flow_publishes_a_course() {
    let router = router();
    let s = Some("flow-1");

    let res = send(&router, call("POST", "/api/drafts/events", s, Some(json!({"event": "create"})))).await;
    assert_eq!(res.status().as_u16(), 200);
    let snap = json_body(res).await;
    assert_eq!(snap["currentStep"], 1);
    assert_eq!(snap["currentCourse"], json!({}));

    let res = send(
        &router,
        call("PATCH", "/api/drafts/current", s, Some(json!({"id": "c1", "title": "Rust 101"}))),
    )
    .await;
    assert_eq!(json_body(res).await["currentCourse"]["title"], "Rust 101");

    for expected in [2, 3] {
        let res = send(&router, call("POST", "/api/drafts/events", s, Some(json!({"event": "next"})))).await;
        assert_eq!(json_body(res).await["currentStep"], expected);
    }

    let res = send(
        &router,
        call("POST", "/api/drafts/events", s, Some(json!({"event": "publishConfirmed"}))),
    )
    .await;
    let snap = json_body(res).await;
    assert_eq!(snap["currentStep"], 0);
    assert_eq!(snap["currentCourse"], Value::Null);
    assert_eq!(snap["courses"][0]["id"], "c1");
    assert_eq!(snap["courses"][0]["status"], "published");

    let res = send(&router, call("GET", "/api/drafts/courses/c1", s, None)).await;
    assert_eq!(json_body(res).await["title"], "Rust 101");
}

#[tokio::test]
async fn invalid_step_and_transition_are_rejected() {
    let router = router();
    let s = Some("steps-1");

    let res = send(&router, call("PUT", "/api/drafts/step", s, Some(json!({"step": 7})))).await;
    assert_eq!(res.status().as_u16(), 400);

    let res = send(&router, call("POST", "/api/drafts/events", s, Some(json!({"event": "next"})))).await;
    assert_eq!(res.status().as_u16(), 409);

    let res = send(&router, call("PUT", "/api/drafts/step", s, Some(json!({"step": 2})))).await;
    let snap = json_body(res).await;
    assert_eq!(snap["currentStep"], 2);
    assert_eq!(snap["currentCourse"], json!({}));
}

#[tokio::test]
async fn courses_rest_create_patch_delete() {
    let router = router();
    let s = Some("rest-1");

    let res = send(&router, call("POST", "/api/drafts/courses", s, Some(json!({"title": "No id"})))).await;
    assert_eq!(res.status().as_u16(), 200);
    let created = json_body(res).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["status"], "draft");

    let uri = format!("/api/drafts/courses/{id}");
    let res = send(&router, call("PATCH", &uri, s, Some(json!({"title": "ignored"})))).await;
    assert_eq!(res.status().as_u16(), 400);

    let res = send(&router, call("PATCH", &uri, s, Some(json!({"status": "published"})))).await;
    assert_eq!(json_body(res).await["status"], "published");

    let res = send(&router, call("PUT", &uri, s, Some(json!({"title": "x"})))).await;
    assert_eq!(res.status().as_u16(), 405);

    let res = send(&router, call("DELETE", &uri, s, None)).await;
    assert_eq!(json_body(res).await["id"], id.as_str());

    let res = send(&router, call("DELETE", &uri, s, None)).await;
    assert_eq!(res.status().as_u16(), 404);

    let res = send(&router, call("GET", "/api/drafts/courses", s, None)).await;
    assert_eq!(json_body(res).await, json!([]));
}

#[tokio::test]
async fn create_with_keep_step_leaves_the_wizard_open() {
    let router = router();
    let s = Some("keep-1");

    send(&router, call("POST", "/api/drafts/events", s, Some(json!({"event": "create"})))).await;
    send(
        &router,
        call("POST", "/api/drafts/courses?keepStep=true", s, Some(json!({"id": "k1"}))),
    )
    .await;

    let snap = json_body(send(&router, call("GET", "/api/drafts", s, None)).await).await;
    assert_eq!(snap["currentStep"], 1);
    assert_eq!(snap["courses"][0]["id"], "k1");
}

#[tokio::test]
async fn sessions_are_isolated_per_tenant() {
    let router = router();

    let mut req = call("PATCH", "/api/drafts/current", Some("shared"), Some(json!({"title": "Acme"})));
    req.headers_mut().insert("host", "acme.tutera.app".parse().unwrap());
    send(&router, req).await;

    let mut req = call("GET", "/api/drafts", Some("shared"), None);
    req.headers_mut().insert("x-tenant-id", "globex".parse().unwrap());
    let snap = json_body(send(&router, req).await).await;
    assert_eq!(snap["currentCourse"], Value::Null);

    let mut req = call("GET", "/api/drafts", Some("shared"), None);
    req.headers_mut().insert("host", "acme.tutera.app".parse().unwrap());
    let snap = json_body(send(&router, req).await).await;
    assert_eq!(snap["currentCourse"]["title"], "Acme");
}

#[tokio::test]
async fn autosave_is_applied_before_the_next_read() {
    let router = router();
    let s = Some("auto-1");

    for title in ["R", "Ru", "Rust"] {
        let res = send(
            &router,
            call("POST", "/api/drafts/current/autosave", s, Some(json!({"title": title}))),
        )
        .await;
        assert_eq!(res.status().as_u16(), 202);
    }

    let snap = json_body(send(&router, call("GET", "/api/drafts", s, None)).await).await;
    assert_eq!(snap["currentCourse"]["title"], "Rust");
}

#[tokio::test]
async fn flags_and_preferences() {
    let router = router();
    let s = Some("prefs-1");

    let res = send(&router, call("PUT", "/api/drafts/flags", s, Some(json!({"showQuiz": true})))).await;
    let snap = json_body(res).await;
    assert_eq!(snap["showQuiz"], true);
    assert_eq!(snap["showPreview"], false);

    let res = send(
        &router,
        call(
            "PUT",
            "/api/drafts/preferences",
            s,
            Some(json!({"userRole": "admin", "customizationStep": 2})),
        ),
    )
    .await;
    assert_eq!(res.status().as_u16(), 204);

    let res = send(&router, call("GET", "/api/drafts/preferences", s, None)).await;
    assert_eq!(
        json_body(res).await,
        json!({"userRole": "admin", "tenantName": null, "customizationStep": 2})
    );
}

#[tokio::test]
async fn malformed_body_is_400() {
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/drafts/current")
        .header("x-session-id", "bad-body")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\":"))
        .unwrap();
    let res = send(&router(), req).await;
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["className"], "bad-request");
}

#[tokio::test]
async fn file_backed_drafts_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let app_with_dir = || {
        let app = default_app();
        app.set("drafts.dir", dir.path().to_string_lossy().to_string());
        build_from(app).unwrap().into_router()
    };

    let first = app_with_dir();
    send(&first, call("PUT", "/api/drafts/step", Some("disk-1"), Some(json!({"step": 1})))).await;
    send(
        &first,
        call("PATCH", "/api/drafts/current", Some("disk-1"), Some(json!({"title": "Saved"}))),
    )
    .await;
    assert!(dir.path().join("default").join("disk-1.json").exists());

    let second = app_with_dir();
    let snap = json_body(send(&second, call("GET", "/api/drafts", Some("disk-1"), None)).await).await;
    assert_eq!(snap["currentStep"], 1);
    assert_eq!(snap["currentCourse"]["title"], "Saved");
}

#[tokio::test]
async fn pages_follow_edge_routing() {
    let router = router();
    let page = |host: &str, uri: &str, cookie: Option<&str>| {
        let mut b = Request::builder().uri(uri).header("host", host);
        if let Some(c) = cookie {
            b = b.header("cookie", c);
        }
        b.body(Body::empty()).unwrap()
    };

    let res = send(&router, page("tutera.app", "/pricing", None)).await;
    assert_eq!(json_body(res).await, json!({"page": "pricing", "tenant": null}));

    let res = send(&router, page("tutera.app", "/dashboard", None)).await;
    assert_eq!(res.status().as_u16(), 404);

    let res = send(&router, page("acme.tutera.app", "/dashboard", None)).await;
    assert_eq!(res.status().as_u16(), 307);

    let res = send(&router, page("acme.tutera.app", "/dashboard/courses", Some("accessToken=t"))).await;
    assert_eq!(res.headers().get("x-tenant-slug").unwrap(), "acme");
    assert_eq!(json_body(res).await, json!({"page": "dashboard/courses", "tenant": "acme"}));

    let res = send(&router, page("acme.tutera.app", "/", Some("accessToken=t"))).await;
    assert_eq!(json_body(res).await, json!({"page": "home", "tenant": "acme"}));
}

#[tokio::test]
async fn tenants_named_like_static_routes_get_their_own_home() {
    let router = router();
    for tenant in ["contact", "health", "pricing"] {
        let req = Request::builder()
            .uri("/")
            .header("host", format!("{tenant}.tutera.app"))
            .header("cookie", "accessToken=t")
            .body(Body::empty())
            .unwrap();
        let res = send(&router, req).await;
        assert_eq!(res.status().as_u16(), 200, "{tenant}");
        assert_eq!(res.headers().get("x-tenant-slug").unwrap(), tenant);
        assert_eq!(json_body(res).await, json!({"page": "home", "tenant": tenant}));
    }

    let req = Request::builder()
        .uri("/contact")
        .header("host", "tutera.app")
        .body(Body::empty())
        .unwrap();
    assert_eq!(json_body(send(&router, req).await).await, json!({"page": "contact", "tenant": null}));
}
