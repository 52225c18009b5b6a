use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::dispatcher::Dispatcher;
use super::request::{IncomingRequest, MAX_BODY_BYTES};
use super::route::Controller;
use super::table::RouteTable;
use crate::config::PipelineOptions;
use crate::error::PipelineError;
use crate::swagger::{self, SwaggerError, SwaggerInfo, SwaggerOptions};

/// Identifies the table slot a mounted handler dispatches to
#[derive(Debug, Clone)]
struct RouteKey {
    prefix: String,
    path: String,
    method: Method,
    tag: String,
}

#[derive(Clone)]
struct MountedSwagger {
    document: Arc<Value>,
    options: SwaggerOptions,
}

/// Registration API and axum integration.
///
/// Register controllers first, optionally generate the swagger document, then
/// build the router. Mounted handlers read the route table on every request,
/// so re-registering a prefix takes effect for paths that are already mounted.
#[derive(Clone)]
pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    table: Arc<RwLock<RouteTable>>,
    swagger: Arc<RwLock<Option<MountedSwagger>>>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(options)),
            table: Arc::new(RwLock::new(RouteTable::new())),
            swagger: Arc::new(RwLock::new(None)),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register a controller.
    ///
    /// Without a name the controller is mounted at the root and `prefix` is
    /// ignored; otherwise it is mounted at `prefix + "/" + name`, with the
    /// prefix given a leading slash and stripped of trailing ones. Registering
    /// the same mount point again overwrites the earlier controller.
    pub fn register(&self, name: Option<&str>, controller: Controller, prefix: Option<&str>) {
        let (mount, tag) = match name {
            None => (String::new(), "root".to_string()),
            Some(name) => (
                format!("{}/{}", normalize_prefix(prefix.unwrap_or("")), name.trim_matches('/')),
                name.to_string(),
            ),
        };

        let mut table = self.table.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if table.insert(mount.clone(), tag, controller) {
            tracing::warn!("Controller at '{}' re-registered; previous definition overwritten", mount);
        } else {
            tracing::debug!("Registered controller at '{}'", mount);
        }
    }

    pub fn register_root(&self, controller: Controller) {
        self.register(None, controller, None)
    }

    pub fn register_named(&self, name: &str, controller: Controller) {
        self.register(Some(name), controller, None)
    }

    /// Copy of the current route table
    pub fn snapshot(&self) -> RouteTable {
        self.read_table().clone()
    }

    /// Generate and validate the swagger document and mount it on the next
    /// [`Pipeline::router`] call. Nothing is mounted if validation fails.
    pub fn swagger(&self, info: SwaggerInfo, options: SwaggerOptions) -> Result<Value, SwaggerError> {
        let document = swagger::generate(&self.read_table(), &info)?;

        let mut mounted = self.swagger.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *mounted = Some(MountedSwagger {
            document: Arc::new(document.clone()),
            options,
        });

        Ok(document)
    }

    /// Build the axum router for everything registered so far
    pub fn router(&self) -> Router {
        let table = self.snapshot();
        let mut router = Router::new();
        let mut mounted = BTreeSet::new();

        for entry in table.entries() {
            for (path, methods) in entry.controller.paths() {
                let index = path == "/";
                let mut method_router = MethodRouter::new();

                for (method, _) in methods {
                    let Some(filter) = method_filter(method) else {
                        tracing::warn!("Method {} on {}{} is not supported; skipping", method, entry.prefix, path);
                        continue;
                    };
                    if index && (method == Method::PUT || method == Method::DELETE) {
                        continue;
                    }

                    let key = RouteKey {
                        prefix: entry.prefix.clone(),
                        path: path.to_string(),
                        method: method.clone(),
                        tag: entry.tag.clone(),
                    };
                    method_router = method_router.on(filter, self.route_handler(key));
                }

                // Index resources are never replaced or deleted directly
                if index {
                    for method in [Method::PUT, Method::DELETE] {
                        if let Some(filter) = method_filter(&method) {
                            let hit = format!("Hit {} handler for {} on {}", method, path, entry.tag);
                            method_router = method_router.on(filter, self.reject_handler(hit));
                        }
                    }
                }

                let method_router = method_router.fallback(|| async { StatusCode::NOT_FOUND });

                for axum_path in mount_paths(&entry.prefix, path) {
                    if mounted.insert(axum_path.clone()) {
                        router = router.route(&axum_path, method_router.clone());
                    } else {
                        tracing::warn!("Path {} is already mounted; skipping duplicate", axum_path);
                    }
                }
            }
        }

        router = router.layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

        let mounted_swagger = self
            .swagger
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(MountedSwagger { document, options }) = mounted_swagger {
            for (path, method_router) in swagger::routes(document, &options) {
                if mounted.insert(path.to_string()) {
                    router = router.route(path, method_router);
                } else {
                    tracing::warn!("Swagger path {} collides with a registered route; skipping", path);
                }
            }
            router = router.layer(axum::middleware::from_fn(swagger::api_key_to_bearer));
        }

        router.fallback(|| async { StatusCode::NOT_FOUND })
    }

    fn route_handler(&self, key: RouteKey) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        let pipeline = self.clone();
        let key = Arc::new(key);
        move |request: Request| {
            let pipeline = pipeline.clone();
            let key = key.clone();
            async move { pipeline.handle(&key, request).await }.boxed()
        }
    }

    fn reject_handler(&self, hit: String) -> impl Fn() -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        let dispatcher = self.dispatcher.clone();
        let hit = Arc::new(hit);
        move || {
            let dispatcher = dispatcher.clone();
            let hit = hit.clone();
            async move {
                dispatcher.trace(&hit);
                dispatcher.fail(PipelineError::NotFound)
            }
            .boxed()
        }
    }

    async fn handle(&self, key: &RouteKey, request: Request) -> Response {
        self.dispatcher
            .trace(&format!("Hit {} handler for {} on {}", key.method, key.path, key.tag));

        let route = self.read_table().resolve(&key.prefix, &key.path, &key.method);

        match IncomingRequest::from_axum(request).await {
            Ok(incoming) => self.dispatcher.dispatch(incoming, route).await,
            Err(error) => self.dispatcher.fail(error),
        }
    }

    fn read_table(&self) -> RwLockReadGuard<'_, RouteTable> {
        self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    if method == Method::GET {
        Some(MethodFilter::GET)
    } else if method == Method::PUT {
        Some(MethodFilter::PUT)
    } else if method == Method::POST {
        Some(MethodFilter::POST)
    } else if method == Method::DELETE {
        Some(MethodFilter::DELETE)
    } else {
        None
    }
}

/// `""` or `/segment[/segment...]` with no trailing slash
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// axum paths serving a controller path. The index answers with and without
/// a trailing slash.
fn mount_paths(prefix: &str, path: &str) -> Vec<String> {
    if path == "/" {
        if prefix.is_empty() {
            vec!["/".to_string()]
        } else {
            vec![prefix.to_string(), format!("{}/", prefix)]
        }
    } else {
        vec![format!("{}{}", prefix, path)]
    }
}
