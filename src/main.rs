use clap::Parser;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use rest_pipeline::auth::{Authorization, JwtBearer, PrincipalRoles};
use rest_pipeline::logging::Silent;
use rest_pipeline::{
    Controller, Pipeline, PipelineOptions, RequestContext, RouteDefinition, ServerConfig, SwaggerInfo,
    SwaggerOptions,
};

#[derive(Parser)]
#[command(name = "rest-pipeline")]
#[command(about = "Demo server for the rest-pipeline routing library")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Port to listen on (overrides PIPELINE_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Serve the interactive swagger browser at /swagger")]
    swagger_ui: bool,

    #[arg(long, value_name = "SUBJECT", help = "Print a demo bearer token for SUBJECT and exit")]
    print_token: Option<String>,

    #[arg(long, value_delimiter = ',', help = "Roles to embed in the printed token")]
    roles: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so PIPELINE_* settings apply to cargo run
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env();
    tracing::info!("Starting rest-pipeline demo in {:?} mode", config.environment);

    if config.jwt_secret.is_empty() {
        anyhow::bail!("PIPELINE_JWT_SECRET must be set");
    }
    let jwt = JwtBearer::new(config.jwt_secret.clone()).with_expiry_hours(config.jwt_expiry_hours);

    if let Some(subject) = cli.print_token {
        let roles: Vec<&str> = cli.roles.iter().map(String::as_str).collect();
        println!("{}", jwt.issue(&subject, &roles)?);
        return Ok(());
    }

    let mut options = PipelineOptions::new().authenticator(jwt).role_checker(PrincipalRoles);
    if !config.trace_events {
        options = options.trace_sink(Silent);
    }

    let pipeline = Pipeline::new(options);
    pipeline.register_root(root_controller());
    pipeline.register_named("greetings", greetings_controller());

    let swagger = SwaggerOptions {
        enable_ui: cli.swagger_ui || config.swagger_ui,
    };
    pipeline.swagger(
        SwaggerInfo::new("rest-pipeline demo", env!("CARGO_PKG_VERSION")).description("Sample controllers"),
        swagger,
    )?;

    let app = pipeline
        .router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let port = cli.port.unwrap_or(config.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn root_controller() -> Controller {
    Controller::new()
        .get(
            "/",
            RouteDefinition::new(|_ctx| async { json!({ "name": "rest-pipeline", "status": "ok" }) })
                .summary("Service status")
                .responses(json!({ "200": { "description": "Service is up" } })),
        )
        .get(
            "/health",
            RouteDefinition::new(|ctx: RequestContext| async move { ctx.typed("text", "ok") })
                .summary("Health check")
                .responses(json!({ "200": { "description": "Plain text ok" } })),
        )
}

fn greetings_controller() -> Controller {
    Controller::new()
        .get(
            "/",
            RouteDefinition::new(|ctx: RequestContext| async move {
                let subject = ctx.principal().map(|p| p.subject.clone()).unwrap_or_default();
                json!({ "greeting": format!("Hello, {}", subject) })
            })
            .authentication("bearer")
            .summary("Greet the caller")
            .responses(json!({
                "200": { "description": "Greeting for the authenticated subject" },
                "401": { "description": "Missing or invalid bearer token" }
            })),
        )
        .get(
            "/:name",
            RouteDefinition::new(|ctx: RequestContext| async move {
                let name = ctx.param("name").unwrap_or("stranger").to_string();
                ctx.typed("html", format!("<h1>Hello, {}</h1>", name))
            })
            .anonymous()
            .summary("Greet someone by name"),
        )
        .delete(
            "/:name",
            RouteDefinition::new(|ctx: RequestContext| async move {
                tracing::info!("Greeting for {:?} removed", ctx.param("name"));
            })
            .authentication("bearer")
            .authorization(Authorization::any_of([Authorization::role("admin"), Authorization::role("editor")]))
            .summary("Remove a greeting")
            .responses(json!({
                "204": { "description": "Removed" },
                "403": { "description": "Caller lacks the admin or editor role" }
            })),
        )
}
