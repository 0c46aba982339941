use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;

use crate::errors::TuteraError;
use crate::hooks::{collect_method_hooks, HookContext, HookResult, ServiceHooks};
use crate::hooks::{TuteraAfterHook, TuteraBeforeHook, TuteraErrorHook};
use crate::{
    ServiceMethodKind, TenantContext, TuteraConfig, TuteraConfigSnapshot, TuteraService,
    TuteraServiceRegistry,
};

struct TuteraAppInner<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    registry: RwLock<TuteraServiceRegistry<R, P>>,
    global_hooks: RwLock<ServiceHooks<R, P>>,
    service_hooks: RwLock<HashMap<String, ServiceHooks<R, P>>>,
    config: RwLock<TuteraConfig>,
}

/// TuteraApp is the central application container.
///
/// Framework-agnostic. Holds:
/// - service registry
/// - app hooks
/// - per-service hooks
/// - config
pub struct TuteraApp<R, P = ()>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    inner: Arc<TuteraAppInner<R, P>>,
}

type HooksForMethod<R, P> = (
    Vec<Arc<dyn TuteraBeforeHook<R, P>>>,
    Vec<Arc<dyn TuteraAfterHook<R, P>>>,
    Vec<Arc<dyn TuteraErrorHook<R, P>>>,
);

impl<R, P> Default for TuteraApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> Clone for TuteraApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R, P> TuteraApp<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TuteraAppInner {
                registry: RwLock::new(TuteraServiceRegistry::new()),
                global_hooks: RwLock::new(ServiceHooks::new()),
                service_hooks: RwLock::new(HashMap::new()),
                config: RwLock::new(TuteraConfig::new()),
            }),
        }
    }

    pub fn register_service<S>(&self, name: S, service: Arc<dyn TuteraService<R, P>>)
    where
        S: Into<String>,
    {
        let name = name.into();
        tracing::debug!(service = %name, "registering service");
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, service);
    }

    /// Hooks that run for every service.
    pub fn hooks<F>(&self, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut g = self
            .inner
            .global_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut g);
    }

    pub(crate) fn configure_service_hooks<F>(&self, service_name: &str, f: F)
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        let mut map = self
            .inner
            .service_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let hooks = map.entry(service_name.to_string()).or_default();
        f(hooks);
    }

    pub fn service(&self, name: &str) -> Result<ServiceHandle<R, P>> {
        let svc = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| TuteraError::not_found(format!("Service not found: {name}")).into_anyhow())?;

        Ok(ServiceHandle {
            app: self.clone(),
            name: name.to_string(),
            service: svc,
        })
    }

    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let cfg = self.inner.config.read().unwrap_or_else(PoisonError::into_inner);
        cfg.get(key).map(|v| v.to_string())
    }

    /// Mutate the config in place (env loading and the like).
    pub fn configure<F>(&self, f: F)
    where
        F: FnOnce(&mut TuteraConfig),
    {
        let mut cfg = self.inner.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut cfg);
    }

    pub fn config_snapshot(&self) -> TuteraConfigSnapshot {
        let cfg = self.inner.config.read().unwrap_or_else(PoisonError::into_inner);
        cfg.snapshot()
    }
}

/// A named service plus the app it was registered in.
pub struct ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    app: TuteraApp<R, P>,
    name: String,
    service: Arc<dyn TuteraService<R, P>>,
}

enum Call {
    Find,
    Get(String),
    Create,
    Update(String),
    Patch(Option<String>),
    Remove(Option<String>),
}

impl Call {
    fn method(&self) -> ServiceMethodKind {
        match self {
            Call::Find => ServiceMethodKind::Find,
            Call::Get(_) => ServiceMethodKind::Get,
            Call::Create => ServiceMethodKind::Create,
            Call::Update(_) => ServiceMethodKind::Update,
            Call::Patch(_) => ServiceMethodKind::Patch,
            Call::Remove(_) => ServiceMethodKind::Remove,
        }
    }
}

impl<R, P> ServiceHandle<R, P>
where
    R: Send + 'static,
    P: Send + Clone + 'static,
{
    pub fn hooks<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut ServiceHooks<R, P>),
    {
        self.app.configure_service_hooks(&self.name, f);
        self
    }

    pub fn inner(&self) -> &Arc<dyn TuteraService<R, P>> {
        &self.service
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global hooks first, then service hooks.
    fn collect_hooks_for_method(&self, method: ServiceMethodKind) -> HooksForMethod<R, P> {
        let g = self
            .app
            .inner
            .global_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let map = self
            .app
            .inner
            .service_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut before = collect_method_hooks(&g.before_all, &g.before_by_method, method);
        let mut after = collect_method_hooks(&g.after_all, &g.after_by_method, method);
        let mut error = collect_method_hooks(&g.error_all, &g.error_by_method, method);

        if let Some(h) = map.get(&self.name) {
            before.extend(collect_method_hooks(&h.before_all, &h.before_by_method, method));
            after.extend(collect_method_hooks(&h.after_all, &h.after_by_method, method));
            error.extend(collect_method_hooks(&h.error_all, &h.error_by_method, method));
        }

        (before, after, error)
    }

    async fn invoke(&self, call: &Call, ctx: &mut HookContext<R, P>) -> Result<()> {
        let svc = &self.service;
        let result = match call {
            Call::Find => HookResult::Many(svc.find(&ctx.tenant, ctx.params.clone()).await?),
            Call::Get(id) => HookResult::One(svc.get(&ctx.tenant, id, ctx.params.clone()).await?),
            Call::Create => {
                let data = take_data(ctx)?;
                HookResult::One(svc.create(&ctx.tenant, data, ctx.params.clone()).await?)
            }
            Call::Update(id) => {
                let data = take_data(ctx)?;
                HookResult::One(svc.update(&ctx.tenant, id, data, ctx.params.clone()).await?)
            }
            Call::Patch(id) => {
                let data = take_data(ctx)?;
                HookResult::One(
                    svc.patch(&ctx.tenant, id.as_deref(), data, ctx.params.clone())
                        .await?,
                )
            }
            Call::Remove(id) => HookResult::One(
                svc.remove(&ctx.tenant, id.as_deref(), ctx.params.clone())
                    .await?,
            ),
        };
        ctx.result = Some(result);
        Ok(())
    }

    /// before → service call → after; error hooks on failure.
    async fn run_pipeline(&self, call: Call, mut ctx: HookContext<R, P>) -> Result<HookContext<R, P>> {
        let (before, after, error) = self.collect_hooks_for_method(call.method());

        let res = self.run_stages(&before, &after, &call, &mut ctx).await;

        if let Err(e) = res {
            ctx.error = Some(e);

            for h in &error {
                if let Err(hook_err) = h.run(&mut ctx).await {
                    tracing::warn!(service = %self.name, error = %hook_err, "error hook failed");
                }
            }

            if let Some(err) = ctx.error.take() {
                return Err(err);
            }
        }

        Ok(ctx)
    }

    async fn run_stages(
        &self,
        before: &[Arc<dyn TuteraBeforeHook<R, P>>],
        after: &[Arc<dyn TuteraAfterHook<R, P>>],
        call: &Call,
        ctx: &mut HookContext<R, P>,
    ) -> Result<()> {
        for h in before {
            h.run(ctx).await?;
        }

        self.invoke(call, ctx).await?;

        for h in after {
            h.run(ctx).await?;
        }
        Ok(())
    }

    fn context(&self, tenant: TenantContext, method: ServiceMethodKind, params: P) -> HookContext<R, P> {
        HookContext::new(tenant, self.name.clone(), method, params, self.app.config_snapshot())
    }

    pub async fn find(&self, tenant: TenantContext, params: P) -> Result<Vec<R>> {
        let ctx = self.context(tenant, ServiceMethodKind::Find, params);
        let ctx = self.run_pipeline(Call::Find, ctx).await?;
        match ctx.result {
            Some(HookResult::Many(v)) => Ok(v),
            Some(HookResult::One(v)) => Ok(vec![v]),
            None => Ok(vec![]),
        }
    }

    pub async fn get(&self, tenant: TenantContext, id: &str, params: P) -> Result<R> {
        let ctx = self.context(tenant, ServiceMethodKind::Get, params);
        let ctx = self.run_pipeline(Call::Get(id.to_string()), ctx).await?;
        expect_one(ctx.result, "get")
    }

    pub async fn create(&self, tenant: TenantContext, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Create, params);
        ctx.data = Some(data);
        let ctx = self.run_pipeline(Call::Create, ctx).await?;
        expect_one(ctx.result, "create")
    }

    pub async fn update(&self, tenant: TenantContext, id: &str, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Update, params);
        ctx.data = Some(data);
        let ctx = self.run_pipeline(Call::Update(id.to_string()), ctx).await?;
        expect_one(ctx.result, "update")
    }

    pub async fn patch(&self, tenant: TenantContext, id: Option<&str>, data: R, params: P) -> Result<R> {
        let mut ctx = self.context(tenant, ServiceMethodKind::Patch, params);
        ctx.data = Some(data);
        let ctx = self
            .run_pipeline(Call::Patch(id.map(str::to_string)), ctx)
            .await?;
        expect_one(ctx.result, "patch")
    }

    pub async fn remove(&self, tenant: TenantContext, id: Option<&str>, params: P) -> Result<R> {
        let ctx = self.context(tenant, ServiceMethodKind::Remove, params);
        let ctx = self
            .run_pipeline(Call::Remove(id.map(str::to_string)), ctx)
            .await?;
        expect_one(ctx.result, "remove")
    }
}

fn take_data<R, P>(ctx: &mut HookContext<R, P>) -> Result<R> {
    ctx.data.take().ok_or_else(|| {
        TuteraError::bad_request(format!("{}() requires data", ctx.method.as_str())).into_anyhow()
    })
}

fn expect_one<R>(result: Option<HookResult<R>>, method: &str) -> Result<R> {
    match result {
        Some(HookResult::One(v)) => Ok(v),
        Some(HookResult::Many(_)) => Err(anyhow::anyhow!(
            "{method}() produced HookResult::Many unexpectedly"
        )),
        None => Err(anyhow::anyhow!("{method}() produced no result")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl TuteraService<String, ()> for Echo {
        async fn create(&self, ctx: &TenantContext, data: String, _params: ()) -> Result<String> {
            Ok(format!("{}:{data}", ctx.slug()))
        }

        async fn get(&self, _ctx: &TenantContext, id: &str, _params: ()) -> Result<String> {
            Err(TuteraError::not_found(format!("missing {id}")).into_anyhow())
        }
    }

    struct Upper;

    #[async_trait]
    impl TuteraBeforeHook<String, ()> for Upper {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            if let Some(d) = ctx.data.as_mut() {
                *d = d.to_uppercase();
            }
            Ok(())
        }
    }

    struct Record(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl TuteraAfterHook<String, ()> for Record {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .push(format!("{}.{}", ctx.service, ctx.method.as_str()));
            Ok(())
        }
    }

    struct Recover;

    #[async_trait]
    impl TuteraErrorHook<String, ()> for Recover {
        async fn run(&self, ctx: &mut HookContext<String, ()>) -> Result<()> {
            ctx.error = None;
            ctx.result = Some(HookResult::One("fallback".into()));
            Ok(())
        }
    }

    fn app() -> TuteraApp<String, ()> {
        let app = TuteraApp::new();
        app.register_service("echo", Arc::new(Echo));
        app
    }

    #[tokio::test]
    async fn before_hooks_see_data_and_after_hooks_run() {
        let app = app();
        let seen = Arc::new(Mutex::new(Vec::new()));
        app.hooks(|h| {
            h.after_all(Arc::new(Record(Arc::clone(&seen))));
        });
        let svc = app
            .service("echo")
            .unwrap()
            .hooks(|h| {
                h.before_create(Arc::new(Upper));
            });

        let out = svc
            .create(TenantContext::new("acme"), "hi".into(), ())
            .await
            .unwrap();
        assert_eq!(out, "acme:HI");
        assert_eq!(seen.lock().unwrap().as_slice(), ["echo.create"]);
    }

    #[tokio::test]
    async fn unimplemented_method_is_501() {
        let app = app();
        let err = app
            .service("echo")
            .unwrap()
            .find(TenantContext::new("acme"), ())
            .await
            .unwrap_err();
        assert_eq!(TuteraError::normalize(err).code(), 501);
    }

    #[tokio::test]
    async fn error_hook_can_recover() {
        let app = app();
        let svc = app.service("echo").unwrap().hooks(|h| {
            h.error(ServiceMethodKind::Get, Arc::new(Recover));
        });
        let out = svc.get(TenantContext::new("acme"), "x", ()).await.unwrap();
        assert_eq!(out, "fallback");
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let app = app();
        let err = app.service("nope").err().unwrap();
        assert_eq!(TuteraError::normalize(err).code(), 404);
    }
}
