use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::Instrument;

use super::context::{RequestContext, ResponseSink};
use super::request::IncomingRequest;
use super::result::{normalize, ActionResult};
use super::route::RouteDefinition;
use crate::auth::{authenticate, authorize};
use crate::config::PipelineOptions;
use crate::error::PipelineError;

/// Runs authenticate → authorize → action → normalize for one request.
///
/// All stage failures end in [`Dispatcher::fail`], which emits exactly one
/// response.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    options: Arc<PipelineOptions>,
}

impl Dispatcher {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn dispatch(&self, request: IncomingRequest, route: Option<Arc<RouteDefinition>>) -> Response {
        let route = match route {
            Some(route) => route,
            None => return self.fail(PipelineError::NotFound),
        };

        let span = tracing::debug_span!(
            "dispatch",
            request_id = %request.id(),
            method = %request.method(),
            path = %request.path(),
        );

        match self.run(Arc::new(request), &route).instrument(span).await {
            Ok(response) => response,
            Err(error) => self.fail(error),
        }
    }

    async fn run(&self, request: Arc<IncomingRequest>, route: &RouteDefinition) -> Result<Response, PipelineError> {
        let (authentication, authorization) = self.options.effective_policies(route);

        authenticate(&request, &authentication, self.options.authenticator.as_ref()).await?;

        // Anonymous routes skip authorization whatever it says
        if authentication.is_required() {
            authorize(&request, &authorization, &self.options.role_checker).await?;
        }

        let (sink, mut sent) = ResponseSink::channel();
        let ctx = RequestContext::new(request, sink);

        let result = match AssertUnwindSafe(route.invoke(ctx)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => return Err(self.classify(error)),
            Err(panic) => {
                return Err(PipelineError::InternalFailure(anyhow::anyhow!(
                    "action panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }
        };

        // A closed receiver must not be awaited again
        let pending = match sent.try_recv() {
            Ok(response) => {
                if !matches!(result, ActionResult::NoContent | ActionResult::Skip) {
                    tracing::debug!("Response already sent by action; discarding returned value");
                }
                return Ok(response);
            }
            Err(TryRecvError::Empty) => Some(sent),
            Err(TryRecvError::Closed) => None,
        };

        match (normalize(result)?.into_response(), pending) {
            (Some(response), _) => Ok(response),
            (None, Some(sent)) => sent
                .await
                .map_err(|_| PipelineError::internal("action skipped the response but never sent one")),
            (None, None) => Err(PipelineError::internal("action skipped the response but never sent one")),
        }
    }

    fn classify(&self, error: anyhow::Error) -> PipelineError {
        match self.options.validation.classify(&error) {
            Some(errors) => PipelineError::validation(errors),
            None => PipelineError::InternalFailure(error),
        }
    }

    /// Terminal handler for every failed stage
    pub fn fail(&self, error: PipelineError) -> Response {
        match &error {
            PipelineError::NotFound => {}
            PipelineError::Unauthenticated => self.options.trace_sink.trace("authentication failed"),
            PipelineError::Unauthorized => self.options.trace_sink.trace("authorization failed"),
            PipelineError::PayloadTooLarge => tracing::debug!("Request body over the buffering limit"),
            PipelineError::ValidationFailure { .. } => tracing::debug!("Action reported validation errors"),
            PipelineError::InternalFailure(cause) => self.options.error_sink.error(cause),
        }
        error.into_response()
    }

    pub(crate) fn trace(&self, message: &str) {
        self.options.trace_sink.trace(message);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
