use std::sync::Arc;

use tutera_core::{Course, TuteraApp, TuteraService};

pub mod courses;
pub mod drafts;
pub mod sessions;
pub mod types;

pub use sessions::{DraftSession, DraftSessions, SessionStorage};
pub use types::{resolve_session, validate_session_id, DraftParams, SESSION_ID_HEADER};

pub const COURSES_PATH: &str = "/api/drafts/courses";

pub struct Services {
    pub courses: Arc<dyn TuteraService<Course, DraftParams>>,
}

pub fn configure(sessions: Arc<DraftSessions>) -> Services {
    Services {
        courses: Arc::new(courses::CoursesService::new(sessions)),
    }
}

/// Per-service hooks; call after the services are mounted.
pub fn register_hooks(app: &TuteraApp<Course, DraftParams>) -> anyhow::Result<()> {
    courses::courses_shared::register_hooks(app)
}
