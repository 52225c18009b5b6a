mod ui;
mod validate;

pub use ui::{api_key_to_bearer, routes};
pub use validate::validate;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::pipeline::route::RouteDefinition;
use crate::pipeline::table::RouteTable;

/// Placeholder used when a route declares no responses
pub const DEFAULT_RESPONSE_DESCRIPTION: &str = "No response description provided";

/// The `info` object of the generated document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwaggerInfo {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SwaggerInfo {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwaggerOptions {
    /// Serve the interactive browser at `/swagger`
    pub enable_ui: bool,
}

impl SwaggerOptions {
    pub fn with_ui() -> Self {
        Self { enable_ui: true }
    }
}

#[derive(Error, Debug)]
pub enum SwaggerError {
    #[error("Generated swagger document is invalid: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    #[error("Swagger schema could not be compiled: {0}")]
    Schema(String),

    #[error("Swagger info could not be serialized: {0}")]
    Info(#[from] serde_json::Error),
}

/// Build the document for a route table and validate it
pub fn generate(table: &RouteTable, info: &SwaggerInfo) -> Result<Value, SwaggerError> {
    let document = document(table, info)?;
    validate(&document)?;
    Ok(document)
}

fn document(table: &RouteTable, info: &SwaggerInfo) -> Result<Value, SwaggerError> {
    let mut paths = Map::new();
    let mut tags: Vec<String> = Vec::new();

    for entry in table.entries() {
        if !tags.contains(&entry.tag) {
            tags.push(entry.tag.clone());
        }

        for (path, methods) in entry.controller.paths() {
            let (template, names) = path_template(path);
            let parameters: Vec<Value> = names
                .iter()
                .map(|name| json!({ "name": name, "in": "path", "required": true, "type": "string" }))
                .collect();

            let mut item = Map::new();
            for (method, definition) in methods {
                item.insert(
                    method.as_str().to_ascii_lowercase(),
                    operation(definition, &entry.tag, &parameters),
                );
            }

            paths.insert(format!("{}{}", entry.prefix, template), Value::Object(item));
        }
    }

    Ok(json!({
        "swagger": "2.0",
        "info": serde_json::to_value(info)?,
        "tags": tags.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>(),
        "paths": paths,
    }))
}

fn operation(definition: &RouteDefinition, tag: &str, parameters: &[Value]) -> Value {
    let mut operation = Map::new();

    if let Some(summary) = definition.summary_text() {
        operation.insert("summary".into(), json!(summary));
    }
    if let Some(description) = definition.description_text() {
        operation.insert("description".into(), json!(description));
    }
    operation.insert("tags".into(), json!([tag]));
    if !parameters.is_empty() {
        operation.insert("parameters".into(), Value::Array(parameters.to_vec()));
    }

    let responses = definition
        .declared_responses()
        .cloned()
        .unwrap_or_else(|| json!({ "default": { "description": DEFAULT_RESPONSE_DESCRIPTION } }));
    operation.insert("responses".into(), responses);

    Value::Object(operation)
}

/// Rewrite `:name` segments to `{name}` and collect the parameter names
fn path_template(path: &str) -> (String, Vec<String>) {
    let mut names = Vec::new();
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                names.push(name.to_string());
                format!("{{{}}}", name)
            }
            _ => segment.to_string(),
        })
        .collect();

    (segments.join("/"), names)
}
