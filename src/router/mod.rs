use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Method, StatusCode};
use route_recognizer::Router;
use serde::Serialize;
use serde_json::{Value, json};
use tower::Service;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use self::wrapper::RouteHandler;

pub mod wrapper;

/// A request as seen by API handlers, independent of the HTTP server.
///
/// Header names are stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Path parameters, filled in by the router
    pub params: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(body.to_string())
    }

    /// A path parameter. Missing parameters mean the route table is wrong.
    pub fn param(&self, name: &str) -> Result<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::BadQuery {
                name: name.to_string(),
                value: String::new(),
            })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse an optional query parameter. Absent or empty yields `None`.
    pub fn query_param<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.query.get(name).map(|v| v.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| Error::BadQuery {
                name: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// `{"response": ..., "id"?: ...}` plus status and headers
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// 200 with `{"response": body}`
    pub fn ok<T: Into<Value>>(body: T) -> Self {
        Self::new(StatusCode::OK, json!({ "response": body.into() }))
    }

    /// 200 with `body` serialized as is
    pub fn json<T: Serialize>(body: &T) -> Result<Self> {
        let body = serde_json::to_value(body).map_err(Error::store)?;
        Ok(Self::new(StatusCode::OK, body))
    }

    /// 201 with a `Location` header
    pub fn created(id: &str, location: String) -> Self {
        Self::new(StatusCode::CREATED, json!({ "response": "created", "id": id }))
            .with_header("Location", location)
    }

    pub fn accepted(message: &str) -> Self {
        Self::new(StatusCode::ACCEPTED, json!({ "response": message }))
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `response` field of the body
    pub fn message(&self) -> Option<&Value> {
        self.body.get("response")
    }
}

impl From<Error> for ApiResponse {
    fn from(err: Error) -> Self {
        let status = err.status();
        if status.is_server_error() {
            warn!(error = %err, "request failed");
        } else {
            debug!(error = %err, "request rejected");
        }
        Self::new(status, json!({ "response": err.to_string() }))
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send>>;

/// Type-erased async handler over shared state `S`.
pub type Handler<S> = Arc<dyn Fn(ApiRequest, S) -> HandlerFuture + Send + Sync>;

/// Method table for one path
pub type MethodTable<S> = HashMap<Method, Handler<S>>;

/// Dispatches [`ApiRequest`]s to handlers by path and method.
#[derive(Clone)]
pub struct ApiRouter<S> {
    inner: Router<MethodTable<S>>,
    state: S,
}

impl<S> ApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            inner: Router::new(),
            state,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Register the handlers for `route`. Each route must be added once.
    pub fn add(&mut self, route: &str, table: MethodTable<S>) {
        self.inner.add(route, table);
    }

    pub fn add_handler(&mut self, route: &str, handler: RouteHandler<S>) {
        let mut table = HashMap::new();
        table.insert(handler.method, handler.handler);
        self.add(route, table);
    }

    /// Find the handler for a request and fill in its path parameters.
    pub fn lookup(&self, request: &mut ApiRequest) -> std::result::Result<Handler<S>, StatusCode> {
        let matched = match self.inner.recognize(&request.path) {
            Ok(matched) => matched,
            Err(e) => {
                debug!(path = %request.path, error = %e, "no route");
                return Err(StatusCode::NOT_FOUND);
            }
        };

        let handler = matched
            .handler()
            .get(&request.method)
            .cloned()
            .ok_or(StatusCode::METHOD_NOT_ALLOWED)?;

        request.params = matched
            .params()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(handler)
    }
}

impl<S> Service<ApiRequest> for ApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    type Response = ApiResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<ApiResponse, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut request: ApiRequest) -> Self::Future {
        match self.lookup(&mut request) {
            Ok(handler) => {
                debug!(method = %request.method, path = %request.path, "dispatch");
                let fut = handler(request, self.state.clone());
                Box::pin(async move { Ok(fut.await.unwrap_or_else(ApiResponse::from)) })
            }
            Err(status) => {
                let reason = status.canonical_reason().unwrap_or("error").to_lowercase();
                Box::pin(async move { Ok(ApiResponse::new(status, json!({ "response": reason }))) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::wrapper::{get, post};
    use tower::ServiceExt;

    fn router() -> ApiRouter<u32> {
        let mut router = ApiRouter::new(7);
        router.add_handler(
            "/things/:id",
            get(|req: ApiRequest, state: u32| async move {
                Ok(ApiResponse::ok(format!("{}:{}", req.param("id")?, state)))
            }),
        );
        router.add_handler(
            "/fail",
            post(|_: ApiRequest, _: u32| async { Err(Error::channel_not_found("x")) }),
        );
        router
    }

    #[tokio::test]
    async fn test_dispatch_with_params() {
        let response = router()
            .oneshot(ApiRequest::new(Method::GET, "/things/abc"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.message(), Some(&json!("abc:7")));
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let response = router()
            .oneshot(ApiRequest::new(Method::GET, "/nothing"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let response = router()
            .oneshot(ApiRequest::new(Method::DELETE, "/things/abc"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_envelope() {
        let response = router()
            .oneshot(ApiRequest::new(Method::POST, "/fail"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.message(), Some(&json!("channel x not found")));
    }

    #[test]
    fn test_query_param() {
        let req = ApiRequest::new(Method::GET, "/")
            .with_query("n", "5")
            .with_query("bad", "x")
            .with_query("empty", "");
        assert_eq!(req.query_param::<i64>("n").unwrap(), Some(5));
        assert_eq!(req.query_param::<i64>("empty").unwrap(), None);
        assert_eq!(req.query_param::<i64>("missing").unwrap(), None);
        assert!(matches!(
            req.query_param::<i64>("bad"),
            Err(Error::BadQuery { .. })
        ));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = ApiRequest::new(Method::POST, "/").with_header("Client-ID", "dev");
        assert_eq!(req.header("client-id"), Some("dev"));
        assert_eq!(req.header("CLIENT-ID"), Some("dev"));
    }
}
