mod app;
mod hooks;
mod pages;
pub mod services;

use std::sync::Arc;

use anyhow::Result;
use tutera_axum::AxumApp;
use tutera_core::{Course, TuteraApp};

use crate::services::drafts::{drafts_router, DraftsState};
use crate::services::{DraftParams, DraftSessions, COURSES_PATH};

pub use app::{default_app, tutera_app};

/// The server configured from the environment.
pub fn build() -> Result<AxumApp<Course, DraftParams>> {
    build_from(tutera_app())
}

/// Mount everything on an already configured app.
pub fn build_from(app: TuteraApp<Course, DraftParams>) -> Result<AxumApp<Course, DraftParams>> {
    hooks::global_hooks(&app);

    let cfg = app.config_snapshot();
    let sessions = Arc::new(DraftSessions::from_config(&cfg));
    tracing::debug!(persistent = sessions.is_persistent(), "draft sessions ready");

    let svcs = services::configure(Arc::clone(&sessions));
    let drafts = drafts_router(DraftsState::new(sessions, &cfg));

    let ax = tutera_axum::axum(app).use_service(COURSES_PATH, svcs.courses);
    services::register_hooks(&ax.app)?;

    ax.use_router(drafts).use_router(pages::pages_router()).use_proxy()
}
