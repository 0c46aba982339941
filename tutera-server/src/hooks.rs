use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tutera_core::hooks::{HookContext, HookResult, TuteraAfterHook, TuteraBeforeHook, TuteraErrorHook};
use tutera_core::{Course, TuteraApp};

use crate::services::DraftParams;

pub struct LogRequest;

#[async_trait]
impl TuteraBeforeHook<Course, DraftParams> for LogRequest {
    async fn run(&self, ctx: &mut HookContext<Course, DraftParams>) -> Result<()> {
        tracing::debug!(
            tenant = %ctx.tenant.slug(),
            session = %ctx.params.session,
            service = %ctx.service,
            method = ctx.method.as_str(),
            path = %ctx.params.rest.path,
            "service call"
        );
        Ok(())
    }
}

pub struct LogResult;

#[async_trait]
impl TuteraAfterHook<Course, DraftParams> for LogResult {
    async fn run(&self, ctx: &mut HookContext<Course, DraftParams>) -> Result<()> {
        let count = match &ctx.result {
            Some(HookResult::Many(items)) => items.len(),
            Some(HookResult::One(_)) => 1,
            None => 0,
        };
        tracing::debug!(service = %ctx.service, method = ctx.method.as_str(), count, "service ok");
        Ok(())
    }
}

pub struct LogError;

#[async_trait]
impl TuteraErrorHook<Course, DraftParams> for LogError {
    async fn run(&self, ctx: &mut HookContext<Course, DraftParams>) -> Result<()> {
        if let Some(err) = &ctx.error {
            tracing::info!(
                tenant = %ctx.tenant.slug(),
                service = %ctx.service,
                method = ctx.method.as_str(),
                error = %err,
                "service call failed"
            );
        }
        Ok(())
    }
}

pub fn global_hooks(app: &TuteraApp<Course, DraftParams>) {
    app.hooks(|h| {
        h.before_all(Arc::new(LogRequest));
        h.after_all(Arc::new(LogResult));
        h.error_all(Arc::new(LogError));
    });
}
