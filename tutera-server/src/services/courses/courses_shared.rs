use std::sync::Arc;

use tutera_core::{Course, ServiceCapabilities, ServiceMethodKind, TuteraApp};

use crate::services::DraftParams;

/// Registered service name (the mount path without its leading slash).
pub const SERVICE_NAME: &str = "api/drafts/courses";

/// No `update`: a listed course is only ever replaced by `create` (upsert)
/// or has its status patched.
pub fn course_capabilities() -> ServiceCapabilities {
    ServiceCapabilities::from_methods(vec![
        ServiceMethodKind::Find,
        ServiceMethodKind::Get,
        ServiceMethodKind::Create,
        ServiceMethodKind::Patch,
        ServiceMethodKind::Remove,
    ])
}

pub fn register_hooks(app: &TuteraApp<Course, DraftParams>) -> anyhow::Result<()> {
    app.service(SERVICE_NAME)?.hooks(|h| {
        h.before_create(Arc::new(super::courses_hooks::EnsureCourseId));
        h.before_patch(Arc::new(super::courses_hooks::RequireStatusPatch));
    });
    Ok(())
}
