use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::TuteraConfigSnapshot;
use crate::service::ServiceMethodKind;
use crate::tenant::TenantContext;

/// What a service call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HookResult<R> {
    One(R),
    Many(Vec<R>),
}

/// Context passed to hooks.
///
/// R = record type
/// P = params type (session, query options, etc.)
#[derive(Debug)]
pub struct HookContext<R, P> {
    pub tenant: TenantContext,
    pub service: String,
    pub method: ServiceMethodKind,
    pub params: P,
    /// Input payload (create/update/patch).
    pub data: Option<R>,
    /// Output, visible to after hooks.
    pub result: Option<HookResult<R>>,
    /// Set while error hooks run. Clearing it recovers the call.
    pub error: Option<anyhow::Error>,
    pub config: TuteraConfigSnapshot,
}

impl<R, P> HookContext<R, P> {
    pub fn new(
        tenant: TenantContext,
        service: impl Into<String>,
        method: ServiceMethodKind,
        params: P,
        config: TuteraConfigSnapshot,
    ) -> Self {
        Self {
            tenant,
            service: service.into(),
            method,
            params,
            data: None,
            result: None,
            error: None,
            config,
        }
    }
}

#[async_trait]
pub trait TuteraBeforeHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait TuteraAfterHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

#[async_trait]
pub trait TuteraErrorHook<R, P>: Send + Sync {
    async fn run(&self, ctx: &mut HookContext<R, P>) -> Result<()>;
}

type Before<R, P> = Arc<dyn TuteraBeforeHook<R, P>>;
type After<R, P> = Arc<dyn TuteraAfterHook<R, P>>;
type OnError<R, P> = Arc<dyn TuteraErrorHook<R, P>>;

/// Hooks registered either for every method or for one method.
pub struct ServiceHooks<R, P> {
    pub(crate) before_all: Vec<Before<R, P>>,
    pub(crate) before_by_method: HashMap<ServiceMethodKind, Vec<Before<R, P>>>,
    pub(crate) after_all: Vec<After<R, P>>,
    pub(crate) after_by_method: HashMap<ServiceMethodKind, Vec<After<R, P>>>,
    pub(crate) error_all: Vec<OnError<R, P>>,
    pub(crate) error_by_method: HashMap<ServiceMethodKind, Vec<OnError<R, P>>>,
}

impl<R, P> Default for ServiceHooks<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> ServiceHooks<R, P> {
    pub fn new() -> Self {
        Self {
            before_all: Vec::new(),
            before_by_method: HashMap::new(),
            after_all: Vec::new(),
            after_by_method: HashMap::new(),
            error_all: Vec::new(),
            error_by_method: HashMap::new(),
        }
    }

    pub fn before_all(&mut self, hook: Before<R, P>) -> &mut Self {
        self.before_all.push(hook);
        self
    }

    pub fn before(&mut self, method: ServiceMethodKind, hook: Before<R, P>) -> &mut Self {
        self.before_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn before_create(&mut self, hook: Before<R, P>) -> &mut Self {
        self.before(ServiceMethodKind::Create, hook)
    }

    pub fn before_patch(&mut self, hook: Before<R, P>) -> &mut Self {
        self.before(ServiceMethodKind::Patch, hook)
    }

    pub fn after_all(&mut self, hook: After<R, P>) -> &mut Self {
        self.after_all.push(hook);
        self
    }

    pub fn after(&mut self, method: ServiceMethodKind, hook: After<R, P>) -> &mut Self {
        self.after_by_method.entry(method).or_default().push(hook);
        self
    }

    pub fn error_all(&mut self, hook: OnError<R, P>) -> &mut Self {
        self.error_all.push(hook);
        self
    }

    pub fn error(&mut self, method: ServiceMethodKind, hook: OnError<R, P>) -> &mut Self {
        self.error_by_method.entry(method).or_default().push(hook);
        self
    }
}

/// `*_all` hooks first, then the method-specific ones.
pub(crate) fn collect_method_hooks<H: ?Sized>(
    all: &[Arc<H>],
    by_method: &HashMap<ServiceMethodKind, Vec<Arc<H>>>,
    method: ServiceMethodKind,
) -> Vec<Arc<H>> {
    let mut out: Vec<Arc<H>> = all.to_vec();
    if let Some(specific) = by_method.get(&method) {
        out.extend(specific.iter().cloned());
    }
    out
}
