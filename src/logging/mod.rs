//! Trace and error sinks used by the dispatcher.
//!
//! Both are injected strategies. The defaults forward to `tracing`; [`Silent`]
//! discards everything.

use std::sync::Arc;

/// Receives pipeline trace events ("authentication failed", route hits, ...)
pub trait TraceSink: Send + Sync {
    fn trace(&self, message: &str);
}

/// Receives unclassified action failures. The caller never sees these details.
pub trait ErrorSink: Send + Sync {
    fn error(&self, error: &anyhow::Error);
}

impl<F> TraceSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn trace(&self, message: &str) {
        self(message)
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&anyhow::Error) + Send + Sync,
{
    fn error(&self, error: &anyhow::Error) {
        self(error)
    }
}

/// Default sink: forwards to the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&self, message: &str) {
        tracing::info!(target: "rest_pipeline", "{}", message);
    }
}

impl ErrorSink for TracingSink {
    fn error(&self, error: &anyhow::Error) {
        tracing::error!(target: "rest_pipeline", "Action failed: {:#}", error);
    }
}

/// No-op sink
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl TraceSink for Silent {
    fn trace(&self, _message: &str) {}
}

impl ErrorSink for Silent {
    fn error(&self, _error: &anyhow::Error) {}
}

pub type SharedTraceSink = Arc<dyn TraceSink>;
pub type SharedErrorSink = Arc<dyn ErrorSink>;
