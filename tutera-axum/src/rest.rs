use std::collections::HashMap;

use axum::{
    extract::rejection::JsonRejection,
    extract::{OriginalUri, Path, Query, State},
    http::{header::HOST, HeaderMap, Uri},
    routing, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tutera_core::{
    resolve_tenant, ServiceHandle, ServiceMethodKind, TenantContext, TuteraError, DEFAULT_TENANT,
};

use crate::{
    params::{FromRestParams, RestParams},
    TuteraAxumError, TuteraAxumState,
};

pub const TENANT_ID_HEADER: &str = "x-tenant-id";

pub fn map_json_rejection(rejection: JsonRejection) -> TuteraAxumError {
    TuteraError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into()
}

/// Tenant for an API call: the `Host` subdomain, else `x-tenant-id`, else
/// the default tenant.
pub fn tenant_from_headers(headers: &HeaderMap, root_domain: &str) -> TenantContext {
    let from_host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|host| resolve_tenant(host, root_domain));

    if let Some(tenant_id) = from_host {
        return TenantContext { tenant_id };
    }

    headers
        .get(TENANT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(TenantContext::new)
        .unwrap_or_else(|| TenantContext::new(DEFAULT_TENANT))
}

fn http_verb(method: ServiceMethodKind) -> &'static str {
    match method {
        ServiceMethodKind::Find | ServiceMethodKind::Get => "GET",
        ServiceMethodKind::Create => "POST",
        ServiceMethodKind::Update => "PUT",
        ServiceMethodKind::Patch => "PATCH",
        ServiceMethodKind::Remove => "DELETE",
    }
}

type Prepared<R, P> = (ServiceHandle<R, P>, TenantContext, P);

/// Look up the service, check it exposes `method`, build tenant and params.
fn prepare<R, P>(
    state: &TuteraAxumState<R, P>,
    service_name: &str,
    method: ServiceMethodKind,
    headers: &HeaderMap,
    query: HashMap<String, String>,
    uri: &Uri,
) -> Result<Prepared<R, P>, TuteraAxumError>
where
    R: Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let svc = state.app.service(service_name)?;
    if !svc.inner().capabilities().allows(method) {
        return Err(TuteraError::method_not_allowed(format!(
            "Method `{}` is not supported by this endpoint.",
            method.as_str()
        ))
        .into());
    }

    let tenant = tenant_from_headers(headers, &state.root_domain);
    let params = RestParams::from_parts("rest", headers, query, http_verb(method), uri);
    let params = P::from_rest_params(params)?;
    Ok((svc, tenant, params))
}

/// REST routes for one registered service, mounted at `path` and
/// `path/{id}`.
pub fn service_router<R, P>(path: &str, service_name: &str, state: TuteraAxumState<R, P>) -> Router<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    P: FromRestParams + Send + Sync + Clone + 'static,
{
    let base = path.trim_end_matches('/').to_string();
    let item = format!("{base}/{{id}}");
    let name: std::sync::Arc<str> = service_name.into();

    Router::new()
        .route(
            &base,
            routing::get({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Find, &headers, query, &uri)?;
                    let res = svc.find(tenant, params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            })
            .post({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Create, &headers, query, &uri)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc.create(tenant, data, params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            }),
        )
        .route(
            &item,
            routing::get({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Get, &headers, query, &uri)?;
                    let res = svc.get(tenant, &id, params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            })
            .put({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Update, &headers, query, &uri)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc.update(tenant, &id, data, params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            })
            .patch({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>,
                      data: Result<Json<R>, JsonRejection>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Patch, &headers, query, &uri)?;
                    let Json(data) = data.map_err(map_json_rejection)?;
                    let res = svc.patch(tenant, Some(&id), data, params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            })
            .delete({
                let name = name.clone();
                move |State(state): State<TuteraAxumState<R, P>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>,
                      OriginalUri(uri): OriginalUri,
                      Path(id): Path<String>| async move {
                    let (svc, tenant, params) =
                        prepare(&state, &name, ServiceMethodKind::Remove, &headers, query, &uri)?;
                    let res = svc.remove(tenant, Some(&id), params).await?;
                    Ok::<_, TuteraAxumError>(Json(res))
                }
            }),
        )
        .with_state(state)
}
