//! Declarative routing and the per-request pipeline.
//!
//! Controllers map paths to per-method [`RouteDefinition`]s and are registered
//! on a [`Pipeline`], which mounts them on an axum router. Every request then
//! runs authenticate → authorize → action → normalize in the [`Dispatcher`].

pub mod context;
pub mod dispatcher;
pub mod request;
pub mod result;
pub mod route;
pub mod router;
pub mod table;

pub use context::{RequestContext, ResponseSink};
pub use dispatcher::Dispatcher;
pub use request::IncomingRequest;
pub use result::{normalize, resolve_content_type, ActionResult, IntoOutcome, JsonBody, Normalized, ToJson};
pub use route::{Controller, RouteDefinition};
pub use router::Pipeline;
pub use table::{ControllerEntry, RouteTable};
