use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::context::RequestContext;
use super::result::{ActionResult, IntoOutcome};
use crate::auth::{Authentication, Authorization};

/// Application-supplied handler
pub type Action = Arc<dyn Fn(RequestContext) -> BoxFuture<'static, anyhow::Result<ActionResult>> + Send + Sync>;

/// Action plus its authentication and authorization policy.
///
/// Unset policies fall back to the pipeline defaults at dispatch time.
#[derive(Clone)]
pub struct RouteDefinition {
    action: Action,
    authentication: Option<Authentication>,
    authorization: Option<Authorization>,
    summary: Option<String>,
    description: Option<String>,
    responses: Option<Value>,
}

impl RouteDefinition {
    pub fn new<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome,
    {
        let action: Action = Arc::new(move |ctx: RequestContext| {
            let pending = handler(ctx);
            async move { pending.await.into_outcome() }.boxed()
        });

        Self {
            action,
            authentication: None,
            authorization: None,
            summary: None,
            description: None,
            responses: None,
        }
    }

    pub fn authentication(mut self, spec: impl Into<Authentication>) -> Self {
        self.authentication = Some(spec.into());
        self
    }

    /// No authentication (and therefore no authorization) for this route
    pub fn anonymous(self) -> Self {
        self.authentication(Authentication::Anonymous)
    }

    pub fn authorization(mut self, spec: impl Into<Authorization>) -> Self {
        self.authorization = Some(spec.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Swagger `responses` object, e.g. `{"200": {"description": "..."}}`
    pub fn responses(mut self, responses: Value) -> Self {
        self.responses = Some(responses);
        self
    }

    pub fn authentication_spec(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn authorization_spec(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn declared_responses(&self) -> Option<&Value> {
        self.responses.as_ref()
    }

    pub(crate) fn invoke(&self, ctx: RequestContext) -> BoxFuture<'static, anyhow::Result<ActionResult>> {
        (self.action)(ctx)
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("authentication", &self.authentication)
            .field("authorization", &self.authorization)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Route definitions of one path, by method
pub type MethodRoutes = Vec<(Method, Arc<RouteDefinition>)>;

/// Named grouping of path → method → route definition.
///
/// Paths keep their declaration order, which is the order they are documented in.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    paths: Vec<(String, MethodRoutes)>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Method names are case-insensitive; a repeated
    /// path+method replaces the earlier definition.
    pub fn route(mut self, path: &str, method: &str, definition: RouteDefinition) -> Self {
        let method = match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                tracing::warn!("Ignoring route {} with invalid method '{}'", path, method);
                return self;
            }
        };

        let path = normalize_path(path);
        let definition = Arc::new(definition);

        let methods = match self.paths.iter().position(|(existing, _)| *existing == path) {
            Some(index) => &mut self.paths[index].1,
            None => {
                self.paths.push((path, Vec::new()));
                let last = self.paths.len() - 1;
                &mut self.paths[last].1
            }
        };

        match methods.iter_mut().find(|(existing, _)| *existing == method) {
            Some(slot) => slot.1 = definition,
            None => methods.push((method, definition)),
        }

        self
    }

    pub fn get(self, path: &str, definition: RouteDefinition) -> Self {
        self.route(path, "GET", definition)
    }

    pub fn put(self, path: &str, definition: RouteDefinition) -> Self {
        self.route(path, "PUT", definition)
    }

    pub fn post(self, path: &str, definition: RouteDefinition) -> Self {
        self.route(path, "POST", definition)
    }

    pub fn delete(self, path: &str, definition: RouteDefinition) -> Self {
        self.route(path, "DELETE", definition)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&str, &MethodRoutes)> {
        self.paths.iter().map(|(path, methods)| (path.as_str(), methods))
    }

    pub fn lookup(&self, path: &str, method: &Method) -> Option<&Arc<RouteDefinition>> {
        self.paths
            .iter()
            .find(|(existing, _)| existing == path)
            .and_then(|(_, methods)| methods.iter().find(|(m, _)| m == method))
            .map(|(_, definition)| definition)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
