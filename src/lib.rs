pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod swagger;

pub use auth::{Authentication, Authorization, Principal};
pub use config::{PipelineOptions, ServerConfig};
pub use error::{PipelineError, ValidationError};
pub use pipeline::{ActionResult, Controller, Pipeline, RequestContext, RouteDefinition};
pub use swagger::{SwaggerInfo, SwaggerOptions};
