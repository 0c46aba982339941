//! JSON page descriptors standing in for rendered pages, so edge routing
//! can be observed end to end.

use axum::body::Body;
use axum::extract::Path;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tutera_axum::TuteraAxumError;
use tutera_core::{TenantContext, TuteraError};

const MARKETING_PAGES: &[&str] = &[
    "/",
    "/contact",
    "/pricing",
    "/forgotPassword",
    "/resetPassword",
    "/signIn",
    "/signUp",
    "/otp",
];

fn page_name(path: &str) -> &str {
    match path.trim_matches('/') {
        "" => "home",
        other => other,
    }
}

/// A tenant whose slug equals a static route (`contact`, `health`, ...) has
/// its home rewritten onto that route; the edge context tells them apart.
fn rewritten_home(req: &Request<Body>) -> Option<Json<Value>> {
    let ctx = req.extensions().get::<TenantContext>()?;
    let slug = ctx.slug();
    (req.uri().path().strip_prefix('/') == Some(slug)).then(|| Json(json!({"page": "home", "tenant": slug})))
}

async fn marketing(req: Request<Body>) -> Json<Value> {
    rewritten_home(&req).unwrap_or_else(|| Json(json!({"page": page_name(req.uri().path()), "tenant": null})))
}

async fn health(req: Request<Body>) -> Response {
    match rewritten_home(&req) {
        Some(page) => page.into_response(),
        None => "ok".into_response(),
    }
}

/// Only requests the edge resolved to this same tenant get a page.
fn tenant_page(tenant: &str, page: &str, req: &Request<Body>) -> Result<Json<Value>, TuteraAxumError> {
    match req.extensions().get::<TenantContext>() {
        Some(ctx) if ctx.slug() == tenant => Ok(Json(json!({"page": page_name(page), "tenant": tenant}))),
        _ => Err(TuteraError::not_found(format!("Page not found: /{tenant}/{page}")).into()),
    }
}

async fn tenant_home(Path(tenant): Path<String>, req: Request<Body>) -> Result<Json<Value>, TuteraAxumError> {
    tenant_page(&tenant, "", &req)
}

async fn tenant_nested(
    Path((tenant, rest)): Path<(String, String)>,
    req: Request<Body>,
) -> Result<Json<Value>, TuteraAxumError> {
    tenant_page(&tenant, &rest, &req)
}

pub fn pages_router() -> Router<()> {
    let router = MARKETING_PAGES
        .iter()
        .fold(Router::new(), |r, path| r.route(path, get(marketing)));

    router
        .route("/health", get(health))
        .route("/{tenant}", get(tenant_home))
        .route("/{tenant}/{*rest}", get(tenant_nested))
}
