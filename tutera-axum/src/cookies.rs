//! Cookie header parsing and `Set-Cookie` building.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use tutera_core::TuteraConfigSnapshot;

pub const ACCESS_TOKEN: &str = "accessToken";
pub const REFRESH_TOKEN: &str = "refreshToken";
pub const TENANT_NAME: &str = "tenantName";
pub const DRAFT_SESSION: &str = "tutera_session";

const DAY: i64 = 24 * 60 * 60;
pub const TOKEN_MAX_AGE: i64 = 7 * DAY;
pub const TENANT_NAME_MAX_AGE: i64 = 30 * DAY;

/// Value of cookie `name` in one raw `Cookie` header value.
pub fn parse_cookie(raw: &str, name: &str) -> Option<String> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}

/// Value of cookie `name` across all `Cookie` headers. First match wins.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|raw| parse_cookie(raw, name))
}

/// The access token, if present and non-empty.
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, ACCESS_TOKEN).filter(|v| !v.is_empty())
}

/// Attributes shared by every cookie this server sets.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieOptions {
    pub fn from_config(cfg: &TuteraConfigSnapshot) -> Self {
        Self {
            domain: cfg.get_string("cookies.domain").filter(|d| !d.is_empty()),
            secure: cfg.get_bool("cookies.secure").unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: i64,
    http_only: bool,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age,
            http_only: true,
        }
    }

    /// Readable from client scripts.
    pub fn script_readable(mut self) -> Self {
        self.http_only = false;
        self
    }

    /// An expired, empty cookie that makes the browser drop `name`.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "", 0)
    }

    pub fn render(&self, opts: &CookieOptions) -> String {
        let mut out = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            self.name, self.value, self.max_age
        );
        if let Some(domain) = &opts.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if opts.secure {
            out.push_str("; Secure");
        }
        out
    }

    /// Only printable ASCII without `;`, `,`, `"`, `\` or whitespace can
    /// be carried without quoting.
    pub fn has_safe_value(&self) -> bool {
        self.value
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b';' | b',' | b'"' | b'\\'))
    }

    /// Append as a `Set-Cookie` header. Unsafe values are skipped.
    pub fn append_to(&self, headers: &mut HeaderMap, opts: &CookieOptions) {
        if !self.has_safe_value() {
            tracing::warn!(cookie = %self.name, "refusing to set cookie with unsafe value");
            return;
        }
        match HeaderValue::from_str(&self.render(opts)) {
            Ok(v) => {
                headers.append(SET_COOKIE, v);
            }
            Err(_) => tracing::warn!(cookie = %self.name, "refusing to set cookie with invalid value"),
        }
    }
}
