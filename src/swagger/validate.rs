use jsonschema::{Draft, Validator};
use once_cell::sync::Lazy;
use serde_json::Value;

use super::SwaggerError;

const SWAGGER_SCHEMA: &str = include_str!("../../schemas/swagger-2.0.json");

static VALIDATOR: Lazy<Result<Validator, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(SWAGGER_SCHEMA).map_err(|e| e.to_string())?;
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&schema)
        .map_err(|e| e.to_string())
});

/// Check a document against the embedded Swagger 2.0 schema, collecting
/// every violation as `"<instance path>: <message>"`.
pub fn validate(document: &Value) -> Result<(), SwaggerError> {
    let validator = VALIDATOR
        .as_ref()
        .map_err(|reason| SwaggerError::Schema(reason.clone()))?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|err| format!("{}: {}", err.instance_path, err))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SwaggerError::Invalid { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_schema_compiles() {
        assert!(VALIDATOR.is_ok());
    }

    #[test]
    fn minimal_document_is_valid() {
        let document = json!({
            "swagger": "2.0",
            "info": { "title": "Tests", "version": "1.0" },
            "paths": {}
        });
        assert!(validate(&document).is_ok());
    }

    #[test]
    fn violations_are_reported_with_paths() {
        let document = json!({
            "swagger": "3.0",
            "info": { "title": "Tests" },
            "paths": { "/": { "get": {} } }
        });

        let Err(SwaggerError::Invalid { errors }) = validate(&document) else {
            panic!("expected validation errors");
        };
        assert!(errors.iter().any(|e| e.starts_with("/swagger")));
        assert!(errors.iter().any(|e| e.starts_with("/info")));
        assert!(errors.iter().any(|e| e.starts_with("/paths/~1/get")));
    }
}
