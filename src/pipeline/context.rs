use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::request::IncomingRequest;
use super::result::{ActionResult, ToJson};
use crate::auth::Principal;

/// Outbound response slot shared between the action and the dispatcher.
///
/// Accepts at most one response. Clones share the slot, so an action may hand
/// it to a spawned task and answer later.
#[derive(Clone)]
pub struct ResponseSink {
    slot: Arc<Mutex<Option<oneshot::Sender<Response>>>>,
}

impl ResponseSink {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (sink, rx)
    }

    /// Write the response. Returns false if one was already written.
    pub fn send(&self, response: Response) -> bool {
        let sender = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        match sender {
            Some(sender) => sender.send(response).is_ok(),
            None => false,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).is_none()
    }
}

/// Invocation scope handed to every action
#[derive(Clone)]
pub struct RequestContext {
    request: Arc<IncomingRequest>,
    response: ResponseSink,
}

impl RequestContext {
    pub(crate) fn new(request: Arc<IncomingRequest>, response: ResponseSink) -> Self {
        Self { request, response }
    }

    pub fn request(&self) -> &Arc<IncomingRequest> {
        &self.request
    }

    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    pub fn request_id(&self) -> Uuid {
        self.request.id()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.request.principal()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn body<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        self.request.json()
    }

    /// Answer directly; takes precedence over whatever the action returns
    pub fn send(&self, response: Response) -> bool {
        self.response.send(response)
    }

    // Response helpers

    /// The action answers itself through [`RequestContext::send`]
    pub fn skip_response(&self) -> ActionResult {
        ActionResult::Skip
    }

    pub fn status(&self, status: u16) -> ActionResult {
        ActionResult::StatusOnly(status)
    }

    pub fn json(&self, status: u16, value: impl Serialize) -> anyhow::Result<ActionResult> {
        ActionResult::json(status, value)
    }

    pub fn hooked(&self, status: u16, value: impl ToJson + 'static) -> ActionResult {
        ActionResult::hooked(status, value)
    }

    /// 200 with an explicit content type (`"html"`, `"text/csv"`, ...)
    pub fn typed(&self, content_type: &str, body: impl Into<Bytes>) -> ActionResult {
        ActionResult::raw(200, content_type, body)
    }

    pub fn raw(&self, status: u16, content_type: &str, body: impl Into<Bytes>) -> ActionResult {
        ActionResult::raw(status, content_type, body)
    }
}
