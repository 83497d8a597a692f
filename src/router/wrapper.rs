use core::fmt::{self, Debug};
use std::fmt::Formatter;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;

use super::{ApiRequest, ApiResponse, Handler, HandlerFuture};
use crate::error::Result;

pub struct RouteHandler<S> {
    pub handler: Handler<S>,
    pub method: Method,
}

impl<S> Debug for RouteHandler<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RouteHandler {{ method: {:?} }}", self.method)
    }
}

impl<S> Clone for RouteHandler<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            method: self.method.clone(),
        }
    }
}

fn wrap<S, F, Fut>(method: Method, f: F) -> RouteHandler<S>
where
    F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
{
    RouteHandler {
        handler: Arc::new(move |req: ApiRequest, state: S| -> HandlerFuture {
            Box::pin(f(req, state))
        }),
        method,
    }
}

pub fn get<S, F, Fut>(f: F) -> RouteHandler<S>
where
    F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
{
    wrap(Method::GET, f)
}

pub fn post<S, F, Fut>(f: F) -> RouteHandler<S>
where
    F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
{
    wrap(Method::POST, f)
}

pub fn put<S, F, Fut>(f: F) -> RouteHandler<S>
where
    F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
{
    wrap(Method::PUT, f)
}

pub fn delete<S, F, Fut>(f: F) -> RouteHandler<S>
where
    F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
{
    wrap(Method::DELETE, f)
}
