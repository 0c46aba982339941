use std::sync::Arc;

use axum::http::HeaderName;
use axum::middleware::from_fn_with_state;
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::Layer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tutera_core::{TuteraApp, TuteraService};

use crate::edge::{self, EdgeConfig};
use crate::params::FromRestParams;
use crate::proxy::{self, ProxyState};
use crate::rest;
use crate::TuteraAxumState;

const REQUEST_ID: &str = "x-request-id";

pub struct AxumApp<R, P = ()>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub app: TuteraApp<R, P>,
    pub router: Router<()>,
}

impl<R, P> Clone for AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            router: self.router.clone(),
        }
    }
}

impl<R, P> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    pub fn new(app: TuteraApp<R, P>) -> Self {
        Self {
            app,
            router: Router::new(),
        }
    }

    fn edge_config(&self) -> EdgeConfig {
        EdgeConfig::from_config(&self.app.config_snapshot())
    }

    /// Merge routes defined elsewhere (pages, custom handlers).
    pub fn use_router(mut self, router: Router<()>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    /// Register `service` under `path` and expose it over REST.
    pub fn use_service(mut self, path: &str, service: Arc<dyn TuteraService<R, P>>) -> Self
    where
        R: Serialize + DeserializeOwned,
        P: FromRestParams,
    {
        let name = path.trim_start_matches('/');
        self.app.register_service(name, service);

        let state = TuteraAxumState::new(self.app.clone(), self.edge_config().root_domain);
        let router = rest::service_router(path, name, state);

        self.router = self.router.merge(router);
        self
    }

    /// Mount the backend proxy under `/api`, configured from `backend.*`
    /// and `cookies.*`.
    pub fn use_proxy(mut self) -> anyhow::Result<Self> {
        let state = ProxyState::from_config(&self.app.config_snapshot())?;
        tracing::debug!(backend = %state.backend.base_url(), "backend proxy mounted");
        self.router = self.router.merge(proxy::proxy_router(state));
        Ok(self)
    }

    /// The finished service: edge routing in front of every route, request
    /// ids and tracing around everything.
    pub fn into_router(self) -> Router<()> {
        let edge_cfg = Arc::new(self.edge_config());
        let edge = from_fn_with_state(edge_cfg, edge::edge_middleware).layer(self.router);
        let request_id = HeaderName::from_static(REQUEST_ID);

        Router::new()
            .fallback_service(edge)
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        axum::serve(listener, self.into_router()).await?;
        Ok(())
    }
}

pub fn axum<R, P>(app: TuteraApp<R, P>) -> AxumApp<R, P>
where
    R: Send + Sync + 'static,
    P: Send + Sync + Clone + 'static,
{
    AxumApp::new(app)
}
