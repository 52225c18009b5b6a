use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::RequestPartsExt;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::PipelineError;

/// Largest request body buffered before the action runs
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Inbound request as seen by the pipeline stages.
///
/// The body is buffered up front so authenticators, checks and the action
/// can all read it. The principal can be attached once, by authentication.
#[derive(Debug)]
pub struct IncomingRequest {
    id: Uuid,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
    principal: OnceCell<Principal>,
}

impl IncomingRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = parse_query(&uri);
        Self {
            id: Uuid::new_v4(),
            method,
            uri,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            query,
            body: Bytes::new(),
            principal: OnceCell::new(),
        }
    }

    /// GET request for a static path, mostly for tests
    pub fn get(uri: &'static str) -> Self {
        Self::new(Method::GET, Uri::from_static(uri))
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Buffer an axum request into an `IncomingRequest`
    pub async fn from_axum(request: Request) -> Result<Self, PipelineError> {
        let (mut parts, body) = request.into_parts();

        // Routes without parameters make the extractor fail; that just means none.
        let params = parts
            .extract::<Path<HashMap<String, String>>>()
            .await
            .map(|Path(params)| params)
            .unwrap_or_default();

        let method = parts.method.clone();
        let uri = parts.uri.clone();
        let headers = parts.headers.clone();

        // Honors the router's DefaultBodyLimit, which defaults to MAX_BODY_BYTES
        let body = Bytes::from_request(Request::from_parts(parts, body), &())
            .await
            .map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    PipelineError::PayloadTooLarge
                } else {
                    PipelineError::InternalFailure(anyhow::anyhow!(
                        "failed to read request body: {}",
                        rejection.body_text()
                    ))
                }
            })?;

        let mut incoming = Self::new(method, uri).with_params(params).with_body(body);
        incoming.headers = headers;
        Ok(incoming)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the buffered body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.get()
    }

    /// Attach the authenticated principal. Returns false if one was already set.
    pub fn set_principal(&self, principal: Principal) -> bool {
        self.principal.set(principal).is_ok()
    }
}

fn parse_query(uri: &Uri) -> HashMap<String, String> {
    uri.query()
        .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
