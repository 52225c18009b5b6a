use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use super::{run_check, Authorization, Principal};
use crate::error::PipelineError;
use crate::pipeline::request::IncomingRequest;

/// External role lookup for `Authorization::Role`
pub trait RoleChecker: Send + Sync {
    fn has_role(&self, principal: &Principal, role: &str) -> bool;
}

impl<F> RoleChecker for F
where
    F: Fn(&Principal, &str) -> bool + Send + Sync,
{
    fn has_role(&self, principal: &Principal, role: &str) -> bool {
        self(principal, role)
    }
}

/// Default role checker: nobody holds any role.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl RoleChecker for DenyAll {
    fn has_role(&self, _principal: &Principal, _role: &str) -> bool {
        false
    }
}

/// Checks the roles carried on the principal itself (e.g. JWT `roles` claim).
#[derive(Debug, Default, Clone, Copy)]
pub struct PrincipalRoles;

impl RoleChecker for PrincipalRoles {
    fn has_role(&self, principal: &Principal, role: &str) -> bool {
        principal.has_role(role)
    }
}

/// Decide whether the (possibly authenticated) caller may proceed.
pub async fn authorize(
    request: &Arc<IncomingRequest>,
    spec: &Authorization,
    roles: &Arc<dyn RoleChecker>,
) -> Result<(), PipelineError> {
    if evaluate(spec.clone(), request.clone(), roles.clone()).await {
        Ok(())
    } else {
        Err(PipelineError::Unauthorized)
    }
}

fn evaluate(spec: Authorization, request: Arc<IncomingRequest>, roles: Arc<dyn RoleChecker>) -> BoxFuture<'static, bool> {
    async move {
        match spec {
            Authorization::RequirePrincipal => request.principal().is_some(),
            Authorization::Allow => true,
            Authorization::Role(role) => match request.principal() {
                Some(principal) => catch_unwind(AssertUnwindSafe(|| roles.has_role(principal, &role))).unwrap_or_else(|_| {
                    tracing::warn!("Role checker panicked for role '{}'", role);
                    false
                }),
                None => false,
            },
            Authorization::Custom(check) => run_check(&check, request).await,
            Authorization::AnyOf(alternatives) => any_of(alternatives, request, roles).await,
        }
    }
    .boxed()
}

/// First success wins.
///
/// Alternatives run as independent tasks. Once one passes, the rest keep
/// running detached and their results are dropped. An empty list denies.
async fn any_of(alternatives: Vec<Authorization>, request: Arc<IncomingRequest>, roles: Arc<dyn RoleChecker>) -> bool {
    let mut pending: FuturesUnordered<_> = alternatives
        .into_iter()
        .map(|alternative| tokio::spawn(evaluate(alternative, request.clone(), roles.clone())))
        .collect();

    while let Some(joined) = pending.next().await {
        if let Ok(true) = joined {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn deny_all() -> Arc<dyn RoleChecker> {
        Arc::new(DenyAll)
    }

    fn anonymous() -> Arc<IncomingRequest> {
        Arc::new(IncomingRequest::get("/"))
    }

    fn signed_in(roles: &[&str]) -> Arc<IncomingRequest> {
        let request = IncomingRequest::get("/");
        request.set_principal(Principal::new("ada").with_roles(roles.iter().copied()));
        Arc::new(request)
    }

    fn failing() -> Authorization {
        Authorization::custom(|_r: Arc<IncomingRequest>| async { false })
    }

    fn passing() -> Authorization {
        Authorization::custom(|_r: Arc<IncomingRequest>| async {})
    }

    #[tokio::test]
    async fn default_policy_requires_principal() {
        let spec = Authorization::RequirePrincipal;
        assert!(authorize(&anonymous(), &spec, &deny_all()).await.is_err());
        assert!(authorize(&signed_in(&[]), &spec, &deny_all()).await.is_ok());
    }

    #[tokio::test]
    async fn allow_ignores_principal() {
        assert!(authorize(&anonymous(), &Authorization::Allow, &deny_all()).await.is_ok());
    }

    #[tokio::test]
    async fn role_delegates_to_checker() {
        let spec = Authorization::role("admin");
        let principal_roles: Arc<dyn RoleChecker> = Arc::new(PrincipalRoles);

        assert!(authorize(&signed_in(&["admin"]), &spec, &principal_roles).await.is_ok());
        assert!(authorize(&signed_in(&["user"]), &spec, &principal_roles).await.is_err());
        assert!(authorize(&signed_in(&["admin"]), &spec, &deny_all()).await.is_err());
        assert!(authorize(&anonymous(), &spec, &principal_roles).await.is_err());
    }

    #[tokio::test]
    async fn any_of_passes_when_exactly_one_passes() {
        for position in 0..4 {
            let mut alternatives = vec![failing(), failing(), Authorization::role("admin"), failing()];
            alternatives.insert(position, passing());
            let spec = Authorization::any_of(alternatives);

            let result = authorize(&signed_in(&[]), &spec, &deny_all()).await;
            assert!(result.is_ok(), "passing alternative at {} was not honoured", position);
        }
    }

    #[tokio::test]
    async fn any_of_fails_when_all_fail() {
        let spec = Authorization::any_of([failing(), Authorization::role("admin"), failing()]);
        let result = authorize(&signed_in(&[]), &spec, &deny_all()).await;
        assert!(matches!(result, Err(PipelineError::Unauthorized)));
    }

    #[tokio::test]
    async fn empty_any_of_denies() {
        let spec = Authorization::any_of(Vec::new());
        assert!(authorize(&signed_in(&[]), &spec, &deny_all()).await.is_err());
    }

    #[tokio::test]
    async fn any_of_does_not_wait_for_stragglers() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let slow = Authorization::custom(move |_r: Arc<IncomingRequest>| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                flag.store(true, Ordering::SeqCst);
                false
            }
        });

        let spec = Authorization::any_of([slow, passing()]);
        authorize(&anonymous(), &spec, &deny_all()).await.expect("authorized");
        assert!(!finished.load(Ordering::SeqCst));

        // Straggler keeps running to completion; its result is ignored.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn nested_lists_are_evaluated() {
        let spec = Authorization::any_of([failing(), Authorization::any_of([failing(), passing()])]);
        assert!(authorize(&anonymous(), &spec, &deny_all()).await.is_ok());
    }
}
