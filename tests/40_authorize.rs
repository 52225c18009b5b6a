mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use rest_pipeline::auth::{JwtBearer, PrincipalRoles};
use rest_pipeline::pipeline::IncomingRequest;
use rest_pipeline::{Authentication, Authorization, Controller, Pipeline, PipelineOptions, Principal, RouteDefinition};

/// Authenticates everyone as a principal holding the `x-roles` header roles
fn header_roles() -> Authentication {
    Authentication::custom(|request: Arc<IncomingRequest>| async move {
        let roles: Vec<String> = request
            .header("x-roles")
            .unwrap_or("")
            .split(',')
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect();
        request.set_principal(Principal::new("tester").with_roles(roles));
    })
}

fn protected(authorization: Authorization) -> RouteDefinition {
    RouteDefinition::new(|_ctx| async {})
        .authentication(header_roles())
        .authorization(authorization)
}

async fn serve(controller: Controller) -> Result<common::TestServer> {
    let pipeline = Pipeline::new(PipelineOptions::new().silent().role_checker(PrincipalRoles));
    pipeline.register_root(controller);
    common::serve(&pipeline).await
}

async fn status(server: &common::TestServer, path: &str, roles: &str) -> Result<StatusCode> {
    let res = reqwest::Client::new()
        .get(server.url(path))
        .header("x-roles", roles)
        .send()
        .await?;
    Ok(res.status())
}

#[tokio::test]
async fn custom_predicate_outcomes() -> Result<()> {
    let server = serve(
        Controller::new()
            .get("/resolved", protected(Authorization::custom(|_r: Arc<IncomingRequest>| async { Ok::<(), anyhow::Error>(()) })))
            .get(
                "/rejected",
                protected(Authorization::custom(|_r: Arc<IncomingRequest>| async {
                    Err::<(), _>(anyhow::anyhow!("nope"))
                })),
            )
            .get("/false", protected(Authorization::custom(|_r: Arc<IncomingRequest>| async { false }))),
    )
    .await?;

    assert_eq!(status(&server, "/resolved", "").await?, StatusCode::NO_CONTENT);
    assert_eq!(status(&server, "/rejected", "").await?, StatusCode::FORBIDDEN);
    assert_eq!(status(&server, "/false", "").await?, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn role_requirement() -> Result<()> {
    let server = serve(Controller::new().get("/", protected(Authorization::role("admin")))).await?;

    assert_eq!(status(&server, "/", "admin").await?, StatusCode::NO_CONTENT);
    assert_eq!(status(&server, "/", "viewer").await?, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn any_of_passes_on_first_success() -> Result<()> {
    let slow_pass = Authorization::custom(|_r: Arc<IncomingRequest>| async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        true
    });
    let never = Authorization::custom(|_r: Arc<IncomingRequest>| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        false
    });

    let server = serve(
        Controller::new()
            .get("/roles", protected(Authorization::any_of([Authorization::role("admin"), Authorization::role("editor")])))
            .get("/slow", protected(Authorization::any_of([never, slow_pass]))),
    )
    .await?;

    assert_eq!(status(&server, "/roles", "editor").await?, StatusCode::NO_CONTENT);
    assert_eq!(status(&server, "/roles", "admin").await?, StatusCode::NO_CONTENT);
    assert_eq!(status(&server, "/roles", "viewer").await?, StatusCode::FORBIDDEN);

    // The straggler is still sleeping when the response arrives
    let started = std::time::Instant::now();
    assert_eq!(status(&server, "/slow", "").await?, StatusCode::NO_CONTENT);
    assert!(started.elapsed() < Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn anonymous_route_ignores_authorization() -> Result<()> {
    let server = serve(Controller::new().get(
        "/",
        RouteDefinition::new(|_ctx| async {})
            .anonymous()
            .authorization(Authorization::role("admin")),
    ))
    .await?;

    assert_eq!(status(&server, "/", "").await?, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn jwt_roles_with_any_of() -> Result<()> {
    let jwt = JwtBearer::new("integration-secret");
    let editor = jwt.issue("ed", &["editor"])?;
    let viewer = jwt.issue("vi", &["viewer"])?;

    let pipeline = Pipeline::new(PipelineOptions::new().silent().authenticator(jwt).role_checker(PrincipalRoles));
    pipeline.register_named(
        "docs",
        Controller::new().delete(
            "/:id",
            RouteDefinition::new(|_ctx| async {})
                .authentication("bearer")
                .authorization(Authorization::any_of(["admin".into(), "editor".into()])),
        ),
    );
    let server = common::serve(&pipeline).await?;
    let client = reqwest::Client::new();

    let res = client.delete(server.url("/docs/1")).bearer_auth(&editor).send().await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.delete(server.url("/docs/1")).bearer_auth(&viewer).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client.delete(server.url("/docs/1")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
