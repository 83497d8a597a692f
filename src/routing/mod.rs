//! Builder for registering API handlers by path and method.
//!
//! Paths use `route_recognizer` syntax (`/devices/:id`). Handlers for the
//! same path are collected and registered with the router once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use crate::error::Result;
use crate::router::wrapper::{self, RouteHandler};
use crate::router::{ApiRequest, ApiResponse, ApiRouter, MethodTable};

pub struct RouterBuilder<S> {
    state: S,
    routes: BTreeMap<String, MethodTable<S>>,
}

impl<S> RouterBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            state,
            routes: BTreeMap::new(),
        }
    }

    /// Register a prepared handler. A later handler for the same path and
    /// method replaces an earlier one.
    pub fn route(mut self, path: &str, handler: RouteHandler<S>) -> Self {
        self.routes
            .entry(path.to_string())
            .or_insert_with(HashMap::new)
            .insert(handler.method, handler.handler);
        self
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
    {
        self.route(path, wrapper::get(handler))
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
    {
        self.route(path, wrapper::post(handler))
    }

    pub fn put<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
    {
        self.route(path, wrapper::put(handler))
    }

    pub fn delete<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(ApiRequest, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ApiResponse>> + Send + 'static,
    {
        self.route(path, wrapper::delete(handler))
    }

    pub fn build(self) -> ApiRouter<S> {
        let mut router = ApiRouter::new(self.state);
        for (path, table) in self.routes {
            router.add(&path, table);
        }
        router
    }
}
