use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tutera_core::{Course, ServiceCapabilities, TenantContext, TuteraError, TuteraService};

use crate::services::{DraftParams, DraftSessions};

use super::courses_shared;

/// The course list of one draft session.
pub struct CoursesService {
    sessions: Arc<DraftSessions>,
}

impl CoursesService {
    pub fn new(sessions: Arc<DraftSessions>) -> Self {
        Self { sessions }
    }
}

fn not_found(id: &str) -> anyhow::Error {
    TuteraError::not_found(format!("Course not found: {id}")).into_anyhow()
}

fn require_id(id: Option<&str>) -> Result<&str> {
    id.filter(|id| !id.is_empty())
        .ok_or_else(|| TuteraError::bad_request("A course id is required").into_anyhow())
}

#[async_trait]
impl TuteraService<Course, DraftParams> for CoursesService {
    fn capabilities(&self) -> ServiceCapabilities {
        courses_shared::course_capabilities()
    }

    async fn find(&self, ctx: &TenantContext, params: DraftParams) -> Result<Vec<Course>> {
        let session = self.sessions.open(ctx, &params.session).await?;
        let store = session.lock().await;
        Ok(store.courses().to_vec())
    }

    async fn get(&self, ctx: &TenantContext, id: &str, params: DraftParams) -> Result<Course> {
        let session = self.sessions.open(ctx, &params.session).await?;
        let store = session.lock().await;
        store.get_course(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn create(&self, ctx: &TenantContext, data: Course, params: DraftParams) -> Result<Course> {
        let session = self.sessions.open(ctx, &params.session).await?;
        let mut store = session.lock().await;
        Ok(store.add_course(data, params.keep_step))
    }

    async fn patch(&self, ctx: &TenantContext, id: Option<&str>, data: Course, params: DraftParams) -> Result<Course> {
        let id = require_id(id)?;
        let status = data
            .status
            .ok_or_else(|| TuteraError::bad_request("Course patch requires a status").into_anyhow())?;

        let session = self.sessions.open(ctx, &params.session).await?;
        let mut store = session.lock().await;
        Ok(store.update_course_status(id, status)?)
    }

    async fn remove(&self, ctx: &TenantContext, id: Option<&str>, params: DraftParams) -> Result<Course> {
        let id = require_id(id)?;
        let session = self.sessions.open(ctx, &params.session).await?;
        let mut store = session.lock().await;
        store.delete_course(id).ok_or_else(|| not_found(id))
    }
}
