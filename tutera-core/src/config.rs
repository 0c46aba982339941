//! # Tutera Configuration
//!
//! Configuration is a flat string key/value store. The server sets its
//! defaults with `app.set()`, then layers the environment on top:
//!
//! ```rust
//! use tutera_core::TuteraConfig;
//!
//! let mut cfg = TuteraConfig::new();
//! cfg.set("http.port", "3030");
//! cfg.load_env_pairs("TUTERA__", [("TUTERA__HTTP__PORT".to_string(), "8080".to_string())]);
//!
//! assert_eq!(cfg.snapshot().get_u16("http.port"), Some(8080));
//! ```
//!
//! `TUTERA__SECTION__KEY` maps to `section.key`. Keys are case-insensitive,
//! so `TUTERA__DRAFTS__AUTOSAVEMS` overrides `drafts.autosaveMs`.

use std::collections::HashMap;

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

#[derive(Debug, Default)]
pub struct TuteraConfig {
    values: HashMap<String, String>,
}

impl TuteraConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(normalize_key(&key.into()), value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(&normalize_key(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(&normalize_key(key))
    }

    /// Apply `PREFIX` + `SECTION__KEY` pairs as `section.key` overrides.
    pub fn load_env_pairs<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    /// Apply an exact environment variable to a config key if it is set
    /// and non-empty.
    pub fn load_env_alias(&mut self, var: &str, key: &str, value: Option<String>) {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            tracing::debug!(var, key, "config override from environment");
            self.set(key, v);
        }
    }

    pub fn snapshot(&self) -> TuteraConfigSnapshot {
        TuteraConfigSnapshot::new(self.values.clone())
    }
}

/// An immutable copy of the config, handed to hooks and handlers.
#[derive(Debug, Clone, Default)]
pub struct TuteraConfigSnapshot {
    map: HashMap<String, String>,
}

impl TuteraConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(&normalize_key(key)).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.trim().parse::<u16>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.trim() {
            "1" | "true" | "TRUE" | "yes" => Some(true),
            "0" | "false" | "FALSE" | "no" => Some(false),
            _ => None,
        })
    }
}
