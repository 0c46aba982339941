use std::collections::HashMap;

use axum::http::HeaderMap;
use axum::http::Uri;

/// Everything a REST call knows about its request, before a service turns
/// it into its own params type.
#[derive(Debug, Clone, Default)]
pub struct RestParams {
    pub provider: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub raw_query: Option<String>,
}

impl RestParams {
    pub fn from_parts(
        provider: &str,
        headers: &HeaderMap,
        query: HashMap<String, String>,
        method: &str,
        uri: &Uri,
    ) -> Self {
        let mut out = Self {
            provider: provider.to_string(),
            headers: HashMap::new(),
            query,
            method: method.to_string(),
            path: uri.path().to_string(),
            raw_query: uri.query().map(|s| s.to_string()),
        };

        for (k, v) in headers.iter() {
            if let Ok(s) = v.to_str() {
                out.headers.insert(k.to_string(), s.to_string());
            }
        }

        out
    }

    /// Header lookup; names are stored lowercase.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `true` for `1`, `true` and `yes` (any case).
    pub fn query_flag(&self, key: &str) -> bool {
        self.query
            .get(key)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    }
}

/// Conversion from REST request data into a service's params type.
///
/// Fallible so params can reject a request (missing session, bad header)
/// before the service runs.
pub trait FromRestParams: Sized {
    fn from_rest_params(params: RestParams) -> anyhow::Result<Self>;
}

impl FromRestParams for RestParams {
    fn from_rest_params(params: RestParams) -> anyhow::Result<Self> {
        Ok(params)
    }
}

impl FromRestParams for () {
    fn from_rest_params(_params: RestParams) -> anyhow::Result<Self> {
        Ok(())
    }
}
