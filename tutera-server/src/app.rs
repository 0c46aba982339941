use tutera_core::{Course, TuteraApp};

use crate::services::DraftParams;

const DEFAULTS: &[(&str, &str)] = &[
    ("http.host", "127.0.0.1"),
    ("http.port", "3030"),
    ("backend.url", "http://localhost:4000"),
    ("backend.timeoutSecs", "30"),
    ("edge.rootDomain", "localhost:3030"),
    ("cookies.secure", "false"),
    ("drafts.autosaveMs", "300"),
    ("drafts.maxSessions", "10000"),
    ("drafts.idleSecs", "1800"),
];

/// An app holding only the built-in defaults.
pub fn default_app() -> TuteraApp<Course, DraftParams> {
    let app: TuteraApp<Course, DraftParams> = TuteraApp::new();
    for (key, value) in DEFAULTS {
        app.set(*key, *value);
    }
    app
}

/// Defaults, then `TUTERA__SECTION__KEY` overrides, then the deployment
/// variables the frontend already uses.
pub fn tutera_app() -> TuteraApp<Course, DraftParams> {
    let app = default_app();
    app.configure(|cfg| {
        cfg.load_env_pairs("TUTERA__", std::env::vars());
        cfg.load_env_alias(
            "NEXT_PUBLIC_BACKEND_API_URL",
            "backend.url",
            std::env::var("NEXT_PUBLIC_BACKEND_API_URL").ok(),
        );
        cfg.load_env_alias(
            "NEXT_PUBLIC_ROOT_DOMAIN",
            "edge.rootDomain",
            std::env::var("NEXT_PUBLIC_ROOT_DOMAIN").ok(),
        );
        cfg.load_env_alias("COOKIE_DOMAIN", "cookies.domain", std::env::var("COOKIE_DOMAIN").ok());
    });
    app
}
