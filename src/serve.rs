//! HTTP shell around [`ApiRouter`].
//!
//! axum only terminates HTTP here; every request is converted to an
//! [`ApiRequest`] and dispatched through the router as a tower service.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Json, Response};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::router::{ApiRequest, ApiResponse, ApiRouter};

async fn dispatch<S>(
    State(router): State<ApiRouter<S>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: Clone + Send + Sync + 'static,
{
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let request = ApiRequest {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body: body.to_vec(),
        params: HashMap::new(),
    };

    match router.oneshot(request).await {
        Ok(response) => into_http(response),
        Err(never) => match never {},
    }
}

fn into_http(response: ApiResponse) -> Response {
    let mut http = (response.status, Json(response.body)).into_response();
    for (name, value) in response.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    http
}

/// axum application serving `router` for every path
pub fn app<S>(router: ApiRouter<S>) -> Router
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .fallback(dispatch::<S>)
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

/// Serve until `shutdown` resolves
pub async fn serve<S, F>(addr: SocketAddr, router: ApiRouter<S>, shutdown: F) -> std::io::Result<()>
where
    S: Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app(router))
        .with_graceful_shutdown(shutdown)
        .await
}
