//! Action results and the response normalizer.
//!
//! Actions return anything implementing [`IntoOutcome`]; the dispatcher turns
//! that into an [`ActionResult`] and [`normalize`] maps it to a
//! `(status, content type, body)` triple.

use std::fmt;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Custom JSON hook for values that control their own wire form.
///
/// Checked before plain structural serialization.
pub trait ToJson: Send {
    fn to_json(&self) -> anyhow::Result<Value>;
}

/// JSON payload of a result
pub enum JsonBody {
    Value(Value),
    Hooked(Box<dyn ToJson>),
}

impl fmt::Debug for JsonBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonBody::Value(value) => f.debug_tuple("Value").field(value).finish(),
            JsonBody::Hooked(_) => write!(f, "Hooked(..)"),
        }
    }
}

/// Every shape an action may answer with
#[derive(Debug)]
pub enum ActionResult {
    /// Nothing returned: 204 unless a response was already sent
    NoContent,
    /// The action has taken responsibility for the response
    Skip,
    StatusOnly(u16),
    Json(u16, JsonBody),
    Raw {
        status: u16,
        content_type: String,
        body: Bytes,
    },
}

impl ActionResult {
    pub fn json(status: u16, value: impl Serialize) -> anyhow::Result<Self> {
        Ok(ActionResult::Json(status, JsonBody::Value(serde_json::to_value(value)?)))
    }

    pub fn hooked(status: u16, value: impl ToJson + 'static) -> Self {
        ActionResult::Json(status, JsonBody::Hooked(Box::new(value)))
    }

    pub fn raw(status: u16, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        ActionResult::Raw {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Conversion from an action's return value to the pipeline outcome.
///
/// `Err` values are "thrown" errors and go through validation
/// classification in the dispatcher.
pub trait IntoOutcome {
    fn into_outcome(self) -> anyhow::Result<ActionResult>;
}

impl IntoOutcome for ActionResult {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(self)
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::NoContent)
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        if self {
            Ok(ActionResult::Json(200, JsonBody::Value(Value::Bool(true))))
        } else {
            Ok(ActionResult::Skip)
        }
    }
}

impl IntoOutcome for u16 {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::StatusOnly(self))
    }
}

impl IntoOutcome for Value {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::Json(200, JsonBody::Value(self)))
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::Json(200, JsonBody::Value(Value::String(self))))
    }
}

impl IntoOutcome for (u16, Value) {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::Json(self.0, JsonBody::Value(self.1)))
    }
}

impl IntoOutcome for (u16, &str, String) {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::raw(self.0, self.1, self.2))
    }
}

impl IntoOutcome for (u16, &str, &'static str) {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        Ok(ActionResult::raw(self.0, self.1, self.2))
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        match self {
            Some(inner) => inner.into_outcome(),
            None => Ok(ActionResult::NoContent),
        }
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<anyhow::Error>,
{
    fn into_outcome(self) -> anyhow::Result<ActionResult> {
        self.map_err(Into::into)?.into_outcome()
    }
}

/// Normalized response, ready to emit
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Suppressed,
    Reply {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },
}

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Map an action result to `(status, content type, body)`.
///
/// Pure. Fails only when a status is out of range, a content type is not a
/// valid header, or JSON serialization fails.
pub fn normalize(result: ActionResult) -> anyhow::Result<Normalized> {
    match result {
        ActionResult::Skip => Ok(Normalized::Suppressed),
        ActionResult::NoContent => Ok(Normalized::Reply {
            status: StatusCode::NO_CONTENT,
            content_type: None,
            body: Bytes::new(),
        }),
        ActionResult::StatusOnly(status) => Ok(Normalized::Reply {
            status: status_code(status)?,
            content_type: None,
            body: Bytes::new(),
        }),
        ActionResult::Json(status, body) => {
            let value = match body {
                JsonBody::Hooked(hooked) => hooked.to_json()?,
                JsonBody::Value(value) => value,
            };
            Ok(Normalized::Reply {
                status: status_code(status)?,
                content_type: Some(HeaderValue::from_static(JSON_CONTENT_TYPE)),
                body: Bytes::from(serde_json::to_vec(&value)?),
            })
        }
        ActionResult::Raw {
            status,
            content_type,
            body,
        } => Ok(Normalized::Reply {
            status: status_code(status)?,
            content_type: Some(HeaderValue::from_str(resolve_content_type(&content_type))?),
            body,
        }),
    }
}

impl Normalized {
    pub fn into_response(self) -> Option<Response> {
        match self {
            Normalized::Suppressed => None,
            Normalized::Reply {
                status,
                content_type,
                body,
            } => {
                let mut response = (status, body).into_response();
                match content_type {
                    Some(content_type) => {
                        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
                    }
                    None => {
                        response.headers_mut().remove(header::CONTENT_TYPE);
                    }
                }
                Some(response)
            }
        }
    }
}

fn status_code(status: u16) -> anyhow::Result<StatusCode> {
    StatusCode::from_u16(status).map_err(|_| anyhow::anyhow!("action returned invalid status code {}", status))
}

/// Expand short content type names (`html`, `json`, ...) to MIME types
pub fn resolve_content_type(content_type: &str) -> &str {
    if content_type.contains('/') {
        return content_type;
    }

    match content_type.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "text" | "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",
        "ics" | "calendar" => "text/calendar; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(result: ActionResult) -> (u16, Option<String>, String) {
        match normalize(result).expect("normalized") {
            Normalized::Reply {
                status,
                content_type,
                body,
            } => (
                status.as_u16(),
                content_type.map(|v| v.to_str().unwrap().to_string()),
                String::from_utf8(body.to_vec()).unwrap(),
            ),
            Normalized::Suppressed => panic!("unexpected suppression"),
        }
    }

    struct Greeting;

    impl ToJson for Greeting {
        fn to_json(&self) -> anyhow::Result<Value> {
            Ok(json!("foo"))
        }
    }

    #[test]
    fn absent_is_no_content() {
        assert_eq!(reply(().into_outcome().unwrap()), (204, None, String::new()));
        assert_eq!(reply(None::<Value>.into_outcome().unwrap()), (204, None, String::new()));
    }

    #[test]
    fn true_is_json_true() {
        let (status, content_type, body) = reply(true.into_outcome().unwrap());
        assert_eq!(status, 200);
        assert!(content_type.unwrap().contains("json"));
        assert_eq!(body, "true");
    }

    #[test]
    fn false_suppresses() {
        assert_eq!(normalize(false.into_outcome().unwrap()).unwrap(), Normalized::Suppressed);
    }

    #[test]
    fn integer_is_status_only() {
        assert_eq!(reply(400u16.into_outcome().unwrap()), (400, None, String::new()));
    }

    #[test]
    fn pair_is_status_and_json() {
        let (status, content_type, body) = reply((201u16, json!({ "id": 7 })).into_outcome().unwrap());
        assert_eq!(status, 201);
        assert!(content_type.unwrap().contains("json"));
        assert_eq!(body, r#"{"id":7}"#);
    }

    #[test]
    fn pair_uses_json_hook() {
        let (status, _, body) = reply(ActionResult::hooked(202, Greeting));
        assert_eq!(status, 202);
        assert_eq!(body, r#""foo""#);
    }

    #[test]
    fn triple_is_sent_verbatim() {
        let (status, content_type, body) = reply((200u16, "text/calendar", "blahblah\nblahblah").into_outcome().unwrap());
        assert_eq!(status, 200);
        assert_eq!(content_type.as_deref(), Some("text/calendar"));
        assert_eq!(body, "blahblah\nblahblah");
    }

    #[test]
    fn short_content_types_expand() {
        let (_, content_type, body) = reply(ActionResult::raw(200, "html", "<a></a>"));
        assert!(content_type.unwrap().starts_with("text/html"));
        assert_eq!(body, "<a></a>");
    }

    #[test]
    fn other_values_are_implicit_200() {
        let (status, _, body) = reply(json!(["abc", "def"]).into_outcome().unwrap());
        assert_eq!(status, 200);
        assert_eq!(body, r#"["abc","def"]"#);

        let (status, _, body) = reply(json!({}).into_outcome().unwrap());
        assert_eq!(status, 200);
        assert_eq!(body, "{}");

        let (_, content_type, body) = reply("ada".to_string().into_outcome().unwrap());
        assert!(content_type.unwrap().starts_with("application/json"));
        assert_eq!(body, r#""ada""#);
    }

    #[test]
    fn errors_surface() {
        assert!(normalize(ActionResult::StatusOnly(42)).is_err());
        assert!(normalize(ActionResult::raw(200, "text/plain\nx", "")).is_err());
        assert!(Err::<(), _>(anyhow::anyhow!("thrown")).into_outcome().is_err());
    }
}
