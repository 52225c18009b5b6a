use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use super::{run_check, Authentication, Principal};
use crate::error::PipelineError;
use crate::pipeline::request::IncomingRequest;

/// External credential verification, looked up by scheme name.
///
/// `Ok(Some(principal))` attaches the principal to the request,
/// `Ok(None)` succeeds without one and `Err` fails authentication.
#[async_trait]
pub trait AuthenticatorProvider: Send + Sync {
    async fn authenticate(&self, scheme: &str, request: &IncomingRequest) -> anyhow::Result<Option<Principal>>;
}

/// Provider that dispatches to one provider per scheme name
#[derive(Default, Clone)]
pub struct Schemes {
    providers: HashMap<String, Arc<dyn AuthenticatorProvider>>,
}

impl Schemes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a scheme (names compared case-insensitively)
    pub fn with(mut self, scheme: &str, provider: impl AuthenticatorProvider + 'static) -> Self {
        self.providers.insert(scheme.to_ascii_lowercase(), Arc::new(provider));
        self
    }
}

#[async_trait]
impl AuthenticatorProvider for Schemes {
    async fn authenticate(&self, scheme: &str, request: &IncomingRequest) -> anyhow::Result<Option<Principal>> {
        let provider = self
            .providers
            .get(&scheme.to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("no authenticator registered for scheme '{}'", scheme))?;
        provider.authenticate(scheme, request).await
    }
}

/// Resolve who is making the request.
///
/// Every failure path (rejected credentials, missing provider, failing or
/// panicking predicate) collapses to [`PipelineError::Unauthenticated`].
pub async fn authenticate(
    request: &Arc<IncomingRequest>,
    spec: &Authentication,
    provider: Option<&Arc<dyn AuthenticatorProvider>>,
) -> Result<(), PipelineError> {
    let passed = match spec {
        Authentication::Anonymous => true,
        Authentication::Custom(check) => run_check(check, request.clone()).await,
        Authentication::Scheme(scheme) => match provider {
            None => {
                tracing::debug!("Scheme '{}' requested but no authenticator is configured", scheme);
                false
            }
            Some(provider) => {
                let outcome = AssertUnwindSafe(provider.authenticate(scheme, request))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(Some(principal))) => {
                        request.set_principal(principal);
                        true
                    }
                    Ok(Ok(None)) => true,
                    Ok(Err(e)) => {
                        tracing::debug!("Scheme '{}' rejected request: {:#}", scheme, e);
                        false
                    }
                    Err(_) => {
                        tracing::warn!("Authenticator for scheme '{}' panicked", scheme);
                        false
                    }
                }
            }
        },
    };

    if passed {
        Ok(())
    } else {
        Err(PipelineError::Unauthenticated)
    }
}
