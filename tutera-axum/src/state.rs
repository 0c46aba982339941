use std::sync::Arc;

use tutera_core::TuteraApp;

/// Router state for REST service routes.
pub struct TuteraAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: TuteraApp<R, P>,
    /// Used to resolve the tenant from `Host` on API calls.
    pub root_domain: Arc<str>,
}

impl<R, P> Clone for TuteraAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            root_domain: Arc::clone(&self.root_domain),
        }
    }
}

impl<R, P> TuteraAxumState<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: TuteraApp<R, P>, root_domain: impl Into<Arc<str>>) -> Self {
        Self {
            app,
            root_domain: root_domain.into(),
        }
    }
}
