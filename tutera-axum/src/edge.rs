//! Edge routing: tenant resolution and access-cookie gating.
//!
//! Runs in front of the router. Every request gets one [`EdgeDecision`]:
//! bypass (assets, `/api`), public marketing page, redirect to sign-in, or a
//! rewrite onto the tenant-scoped path `/{tenant}{path}`. The access cookie is
//! only checked for presence, never decoded.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tutera_core::{resolve_tenant, TenantContext, TenantId, TuteraConfigSnapshot};

use crate::cookies;

pub const TENANT_SLUG_HEADER: &str = "x-tenant-slug";
pub const DEFAULT_ROOT_DOMAIN: &str = "localhost:3030";

const BYPASS_PREFIXES: &[&str] = &["/_next", "/assets", "/api"];
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".avif"];

/// Served on the bare domain.
const MARKETING_PATHS: &[&str] = &[
    "/",
    "/contact",
    "/pricing",
    "/forgotPassword",
    "/resetPassword",
    "/signIn",
    "/signUp",
    "/otp",
];

/// Reachable on a tenant host without an access cookie.
const TENANT_AUTH_PATHS: &[&str] = &["/signIn", "/signUp", "/otp", "/forgotPassword", "/resetPassword"];

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub root_domain: String,
}

impl EdgeConfig {
    pub fn new(root_domain: impl Into<String>) -> Self {
        Self {
            root_domain: root_domain.into(),
        }
    }

    pub fn from_config(cfg: &TuteraConfigSnapshot) -> Self {
        Self::new(
            cfg.get_string("edge.rootDomain")
                .unwrap_or_else(|| DEFAULT_ROOT_DOMAIN.to_string()),
        )
    }
}

/// The parts of a request the edge looks at.
#[derive(Debug, Clone, Default)]
pub struct EdgeRequest {
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    pub has_access_token: bool,
}

impl EdgeRequest {
    pub fn from_parts(uri: &Uri, headers: &HeaderMap) -> Self {
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            host,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            has_access_token: cookies::access_token(headers).is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Assets and API calls; untouched.
    Bypass,
    /// Allow-listed page on a host without a tenant.
    Public,
    /// No tenant and not allow-listed; the router decides (and 404s).
    Unmatched,
    /// Already tenant-prefixed; forwarded with the tenant attached.
    Tenant(TenantId),
    Redirect { location: String },
    Rewrite { tenant: TenantId, uri: String },
}

impl EdgeDecision {
    fn label(&self) -> &'static str {
        match self {
            EdgeDecision::Bypass => "bypass",
            EdgeDecision::Public => "public",
            EdgeDecision::Unmatched => "unmatched",
            EdgeDecision::Tenant(_) => "tenant",
            EdgeDecision::Redirect { .. } => "redirect",
            EdgeDecision::Rewrite { .. } => "rewrite",
        }
    }
}

fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_bypass(path: &str) -> bool {
    if path == "/favicon.ico" || BYPASS_PREFIXES.iter().any(|p| under(path, p)) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn decide(req: &EdgeRequest, cfg: &EdgeConfig) -> EdgeDecision {
    let path = req.path.as_str();

    if is_bypass(path) {
        return EdgeDecision::Bypass;
    }

    let Some(tenant) = resolve_tenant(&req.host, &cfg.root_domain) else {
        return if MARKETING_PATHS.contains(&path) {
            EdgeDecision::Public
        } else {
            EdgeDecision::Unmatched
        };
    };

    let prefix = format!("/{tenant}");
    if under(path, &prefix) {
        return EdgeDecision::Tenant(tenant);
    }

    if !req.has_access_token && !TENANT_AUTH_PATHS.contains(&path) {
        return EdgeDecision::Redirect {
            location: format!("/signIn?redirect={}", urlencoding::encode(path)),
        };
    }

    let mut uri = if path == "/" { prefix } else { format!("{prefix}{path}") };
    if let Some(q) = &req.query {
        uri.push('?');
        uri.push_str(q);
    }
    EdgeDecision::Rewrite { tenant, uri }
}

/// Axum middleware applying [`decide`]. It must wrap the whole router so
/// rewrites happen before route matching.
pub async fn edge_middleware(State(cfg): State<Arc<EdgeConfig>>, mut req: Request, next: Next) -> Response {
    let edge_req = EdgeRequest::from_parts(req.uri(), req.headers());
    let decision = decide(&edge_req, &cfg);

    tracing::debug!(
        host = %edge_req.host,
        path = %edge_req.path,
        decision = decision.label(),
        "edge decision"
    );

    match decision {
        EdgeDecision::Bypass | EdgeDecision::Public | EdgeDecision::Unmatched => next.run(req).await,
        EdgeDecision::Tenant(tenant) => {
            req.extensions_mut().insert(TenantContext { tenant_id: tenant });
            next.run(req).await
        }
        EdgeDecision::Redirect { location } => Redirect::temporary(&location).into_response(),
        EdgeDecision::Rewrite { tenant, uri } => {
            match uri.parse::<Uri>() {
                Ok(uri) => *req.uri_mut() = uri,
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "edge rewrite produced an invalid uri");
                    return StatusCode::BAD_REQUEST.into_response();
                }
            }

            let slug = HeaderValue::from_str(tenant.as_str()).ok();
            req.extensions_mut().insert(TenantContext { tenant_id: tenant });

            let mut res = next.run(req).await;
            if let Some(slug) = slug {
                res.headers_mut().insert(TENANT_SLUG_HEADER, slug);
            }
            res
        }
    }
}
