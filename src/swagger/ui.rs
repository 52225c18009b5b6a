use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Json;
use serde_json::Value;

use super::SwaggerOptions;

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>API documentation</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/swagger.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>
"#;

/// Routes serving the document, plus the browser when enabled. With the
/// browser disabled its paths answer 404 rather than falling through.
pub fn routes(document: Arc<Value>, options: &SwaggerOptions) -> Vec<(&'static str, MethodRouter)> {
    let json = get(move || {
        let document = document.clone();
        async move { Json(document.as_ref().clone()) }
    });

    let browser: MethodRouter = if options.enable_ui {
        get(|| async { Html(SWAGGER_UI_HTML) })
    } else {
        get(|| async { StatusCode::NOT_FOUND })
    };

    vec![
        ("/swagger.json", json),
        ("/swagger", browser.clone()),
        ("/swagger/", browser),
    ]
}

/// Promote an `api_key` query parameter to a bearer credential when the
/// request carries no Authorization header.
pub async fn api_key_to_bearer(mut request: Request, next: Next) -> Response {
    if !request.headers().contains_key(AUTHORIZATION) {
        let api_key = request.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "api_key")
                .map(|(_, value)| value.into_owned())
        });

        if let Some(api_key) = api_key {
            match HeaderValue::from_str(&format!("Bearer {}", api_key)) {
                Ok(value) => {
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(_) => return StatusCode::BAD_REQUEST.into_response(),
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::Router;
    use serde_json::json;
    use tower::ServiceExt;

    fn echo_authorization() -> Router {
        Router::new()
            .route(
                "/",
                get(|request: Request| async move {
                    request
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string()
                }),
            )
            .layer(axum::middleware::from_fn(api_key_to_bearer))
    }

    async fn body(router: Router, request: Request) -> String {
        let response = router.oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn api_key_becomes_bearer_header() {
        let request = Request::builder().uri("/?api_key=abc").body(Body::empty()).unwrap();
        assert_eq!(body(echo_authorization(), request).await, "Bearer abc");
    }

    #[tokio::test]
    async fn existing_authorization_is_kept() {
        let request = Request::builder()
            .uri("/?api_key=abc")
            .header(AUTHORIZATION, "Bearer xyz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(body(echo_authorization(), request).await, "Bearer xyz");
    }

    #[tokio::test]
    async fn browser_disabled_is_not_found() {
        let mut router = Router::new();
        for (path, method_router) in routes(Arc::new(json!({ "swagger": "2.0" })), &SwaggerOptions::default()) {
            router = router.route(path, method_router);
        }

        let request = Request::builder().uri("/swagger/").body(Body::empty()).unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder().uri("/swagger.json").body(Body::empty()).unwrap();
        assert_eq!(body(router, request).await, r#"{"swagger":"2.0"}"#);
    }
}
