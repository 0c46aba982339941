//! Core multi-tenant types for Tutera.
//!
//! A tenant is never stored: it is derived from the request hostname.
//! `acme.tutera.app` belongs to the `acme` tenant, `tutera.app` and
//! `www.tutera.app` belong to nobody.

use std::fmt;

/// A tenant slug, e.g. `acme` for `acme.tutera.app`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context carried with every Tutera operation.
///
/// This is passed into services and hooks so that
/// all logic is explicitly tenant-aware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
}

impl TenantContext {
    /// Convenience constructor from a string.
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
        }
    }

    pub fn slug(&self) -> &str {
        self.tenant_id.as_str()
    }
}

/// Tenant used when a request carries no tenant information at all.
pub const DEFAULT_TENANT: &str = "default";

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; nothing below matches them anyway.
    if host.starts_with('[') {
        return host;
    }
    host.split_once(':').map_or(host, |(name, _)| name)
}

fn first_label(s: &str) -> Option<&str> {
    s.split('.').next().filter(|l| !l.is_empty())
}

/// Resolve the tenant for a `Host` header value.
///
/// - `acme.localhost:3000` → `acme`, `localhost:3000` → none
/// - `acme.tutera.app` → `acme` when `root_domain` is `tutera.app`
/// - `www.tutera.app`, `tutera.app`, `example.com` → none
///
/// Ports on both `host` and `root_domain` are ignored and matching is
/// case-insensitive.
pub fn resolve_tenant(host: &str, root_domain: &str) -> Option<TenantId> {
    let host = strip_port(host.trim()).to_ascii_lowercase();
    let root = strip_port(root_domain.trim()).to_ascii_lowercase();

    let candidate = if host.contains("localhost") {
        first_label(&host).filter(|l| *l != "localhost")
    } else if root.is_empty() {
        None
    } else {
        host.strip_suffix(root.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .and_then(first_label)
    }?;

    if candidate == "www" {
        return None;
    }

    Some(TenantId(candidate.to_string()))
}
