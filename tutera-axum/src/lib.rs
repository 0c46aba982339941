//! tutera-axum: Axum adapter for Tutera.
//!
//! Builds the HTTP surface from a `TuteraApp`: REST routers for registered
//! services, the edge middleware that resolves tenants and gates pages on the
//! access cookie, and the `/api` proxy to the backend.

pub mod app;
pub mod cookies;
pub mod edge;
pub mod params;
pub mod proxy;
pub mod rest;
pub mod state;
mod error;
pub use error::TuteraAxumError;
pub use state::TuteraAxumState;

pub use app::{axum, AxumApp};
pub use edge::{decide, EdgeConfig, EdgeDecision, EdgeRequest};
pub use params::{FromRestParams, RestParams};
pub use proxy::{BackendClient, ProxyState};
