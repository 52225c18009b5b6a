use std::env;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::{Authentication, AuthenticatorProvider, Authorization, DenyAll, RoleChecker};
use crate::error::{NoValidation, ValidationClassifier};
use crate::logging::{ErrorSink, SharedErrorSink, SharedTraceSink, Silent, TraceSink, TracingSink};
use crate::pipeline::route::RouteDefinition;

/// Pipeline-wide options.
///
/// Route definitions that leave a policy unset inherit it from here at
/// dispatch time.
#[derive(Clone)]
pub struct PipelineOptions {
    pub default_authentication: Authentication,
    pub default_authorization: Authorization,
    pub authenticator: Option<Arc<dyn AuthenticatorProvider>>,
    pub role_checker: Arc<dyn RoleChecker>,
    pub trace_sink: SharedTraceSink,
    pub error_sink: SharedErrorSink,
    pub validation: Arc<dyn ValidationClassifier>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            default_authentication: Authentication::Anonymous,
            default_authorization: Authorization::RequirePrincipal,
            authenticator: None,
            role_checker: Arc::new(DenyAll),
            trace_sink: Arc::new(TracingSink),
            error_sink: Arc::new(TracingSink),
            validation: Arc::new(NoValidation),
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_authentication(mut self, spec: impl Into<Authentication>) -> Self {
        self.default_authentication = spec.into();
        self
    }

    pub fn default_authorization(mut self, spec: impl Into<Authorization>) -> Self {
        self.default_authorization = spec.into();
        self
    }

    pub fn authenticator(mut self, provider: impl AuthenticatorProvider + 'static) -> Self {
        self.authenticator = Some(Arc::new(provider));
        self
    }

    pub fn role_checker(mut self, checker: impl RoleChecker + 'static) -> Self {
        self.role_checker = Arc::new(checker);
        self
    }

    pub fn trace_sink(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace_sink = Arc::new(sink);
        self
    }

    pub fn error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Discard trace and error events
    pub fn silent(self) -> Self {
        self.trace_sink(Silent).error_sink(Silent)
    }

    pub fn validation(mut self, classifier: impl ValidationClassifier + 'static) -> Self {
        self.validation = Arc::new(classifier);
        self
    }

    /// Route policies with defaults filled in for unset fields
    pub fn effective_policies(&self, route: &RouteDefinition) -> (Authentication, Authorization) {
        let authentication = route
            .authentication_spec()
            .cloned()
            .unwrap_or_else(|| self.default_authentication.clone());
        let authorization = route
            .authorization_spec()
            .cloned()
            .unwrap_or_else(|| self.default_authorization.clone());
        (authentication, authorization)
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("default_authentication", &self.default_authentication)
            .field("default_authorization", &self.default_authorization)
            .field("authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

/// Settings for the demo server binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub environment: Environment,
    pub port: u16,
    pub swagger_ui: bool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub trace_events: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env::var("PIPELINE_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|v| v.parse().ok())
        {
            self.port = port;
        }
        if let Ok(v) = env::var("PIPELINE_SWAGGER_UI") {
            self.swagger_ui = v.parse().unwrap_or(self.swagger_ui);
        }
        if let Ok(v) = env::var("PIPELINE_JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Ok(v) = env::var("PIPELINE_JWT_EXPIRY_HOURS") {
            self.jwt_expiry_hours = v.parse().unwrap_or(self.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("PIPELINE_TRACE") {
            self.trace_events = v.parse().unwrap_or(self.trace_events);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            swagger_ui: true,
            jwt_secret: "development-secret".to_string(),
            jwt_expiry_hours: 24 * 7, // 1 week
            trace_events: true,
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            port: 8080,
            swagger_ui: false,
            jwt_secret: String::new(),
            jwt_expiry_hours: 4,
            trace_events: false,
        }
    }
}
