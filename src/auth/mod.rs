pub mod authenticate;
pub mod authorize;
pub mod jwt;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::request::IncomingRequest;

pub use authenticate::{authenticate, AuthenticatorProvider, Schemes};
pub use authorize::{authorize, DenyAll, PrincipalRoles, RoleChecker};
pub use jwt::{Claims, JwtBearer, JwtError};

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: Value,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            claims: Value::Null,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// What a custom check may produce.
///
/// `()` and `true` pass, `false` fails, `None` counts as "absent" and passes.
/// `Err` always fails.
pub trait IntoVerdict {
    fn into_verdict(self) -> bool;
}

impl IntoVerdict for () {
    fn into_verdict(self) -> bool {
        true
    }
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> bool {
        self
    }
}

impl IntoVerdict for Option<bool> {
    fn into_verdict(self) -> bool {
        self.unwrap_or(true)
    }
}

impl<T, E> IntoVerdict for Result<T, E>
where
    T: IntoVerdict,
{
    fn into_verdict(self) -> bool {
        self.map(IntoVerdict::into_verdict).unwrap_or(false)
    }
}

/// Custom authentication or authorization predicate
pub trait RequestCheck: Send + Sync {
    fn check(&self, request: Arc<IncomingRequest>) -> BoxFuture<'static, bool>;
}

impl<F, Fut, V> RequestCheck for F
where
    F: Fn(Arc<IncomingRequest>) -> Fut + Send + Sync,
    Fut: Future<Output = V> + Send + 'static,
    V: IntoVerdict,
{
    fn check(&self, request: Arc<IncomingRequest>) -> BoxFuture<'static, bool> {
        let pending = self(request);
        async move { pending.await.into_verdict() }.boxed()
    }
}

/// Run a check, treating a panic as a failed check.
pub(crate) async fn run_check(check: &Arc<dyn RequestCheck>, request: Arc<IncomingRequest>) -> bool {
    let check = check.clone();
    match AssertUnwindSafe(async move { check.check(request).await })
        .catch_unwind()
        .await
    {
        Ok(passed) => passed,
        Err(_) => {
            tracing::warn!("Request check panicked; treating as failure");
            false
        }
    }
}

/// How a route establishes who is calling
#[derive(Clone)]
pub enum Authentication {
    /// No authentication; also skips authorization entirely
    Anonymous,
    /// Delegate to the configured authenticator provider by scheme name
    Scheme(String),
    Custom(Arc<dyn RequestCheck>),
}

impl Authentication {
    pub fn scheme(name: impl Into<String>) -> Self {
        Authentication::Scheme(name.into())
    }

    pub fn custom(check: impl RequestCheck + 'static) -> Self {
        Authentication::Custom(Arc::new(check))
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, Authentication::Anonymous)
    }
}

impl From<&str> for Authentication {
    fn from(name: &str) -> Self {
        Authentication::scheme(name)
    }
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::Anonymous => write!(f, "Anonymous"),
            Authentication::Scheme(name) => f.debug_tuple("Scheme").field(name).finish(),
            Authentication::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Whether an authenticated caller may proceed
#[derive(Clone)]
pub enum Authorization {
    /// Pass iff a principal was attached during authentication
    RequirePrincipal,
    /// Always pass
    Allow,
    /// Delegate to the configured role checker
    Role(String),
    Custom(Arc<dyn RequestCheck>),
    /// Pass as soon as any alternative passes
    AnyOf(Vec<Authorization>),
}

impl Authorization {
    pub fn role(role: impl Into<String>) -> Self {
        Authorization::Role(role.into())
    }

    pub fn custom(check: impl RequestCheck + 'static) -> Self {
        Authorization::Custom(Arc::new(check))
    }

    pub fn any_of<I>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = Authorization>,
    {
        Authorization::AnyOf(alternatives.into_iter().collect())
    }
}

impl From<&str> for Authorization {
    fn from(role: &str) -> Self {
        Authorization::role(role)
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::RequirePrincipal => write!(f, "RequirePrincipal"),
            Authorization::Allow => write!(f, "Allow"),
            Authorization::Role(role) => f.debug_tuple("Role").field(role).finish(),
            Authorization::Custom(_) => write!(f, "Custom(..)"),
            Authorization::AnyOf(alternatives) => f.debug_tuple("AnyOf").field(alternatives).finish(),
        }
    }
}
