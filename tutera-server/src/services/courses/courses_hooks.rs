use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tutera_core::hooks::{HookContext, TuteraBeforeHook};
use tutera_core::{new_id, Course, TuteraError};

use crate::services::DraftParams;

/// Courses posted without an id get a fresh UUID.
pub struct EnsureCourseId;

#[async_trait]
impl TuteraBeforeHook<Course, DraftParams> for EnsureCourseId {
    async fn run(&self, ctx: &mut HookContext<Course, DraftParams>) -> Result<()> {
        if let Some(course) = ctx.data.as_mut() {
            if course.id.trim().is_empty() {
                course.id = new_id();
            }
        }
        Ok(())
    }
}

/// Status is the only field a patch may change.
pub struct RequireStatusPatch;

#[async_trait]
impl TuteraBeforeHook<Course, DraftParams> for RequireStatusPatch {
    async fn run(&self, ctx: &mut HookContext<Course, DraftParams>) -> Result<()> {
        let has_status = ctx.data.as_ref().is_some_and(|c| c.status.is_some());
        if !has_status {
            return Err(TuteraError::bad_request("Course patch requires a status")
                .with_errors(json!({"status": ["required"]}))
                .into_anyhow());
        }
        Ok(())
    }
}
