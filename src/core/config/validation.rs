use serde_json::{Map, Value};

use crate::core::errors::ResearchError;

pub fn validate_config(config: &Value) -> Result<(), ResearchError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(store) = expect_optional_object(root, "store")? {
        validate_optional_string_field(store, "store.path", "path")?;
        if let Some(embedding) = expect_optional_object(store, "embedding")? {
            validate_enum_field(
                embedding,
                "store.embedding.provider",
                "provider",
                &["hashing", "openai"],
            )?;
            validate_optional_string_field(embedding, "store.embedding.model", "model")?;
            validate_optional_string_field(embedding, "store.embedding.base_url", "base_url")?;
            validate_u64_field(
                embedding,
                "store.embedding.dimension",
                "dimension",
                8,
                16_384,
            )?;
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(
            retrieval,
            "retrieval.default_top_k",
            "default_top_k",
            1,
            1_000,
        )?;
        validate_u64_field(
            retrieval,
            "retrieval.max_query_chars",
            "max_query_chars",
            1,
            1_000_000,
        )?;
    }

    if let Some(context) = expect_optional_object(root, "context")? {
        validate_u64_field(context, "context.max_chars", "max_chars", 64, 10_000_000)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.model", "model")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;

        if let Some(retry) = expect_optional_object(llm, "retry")? {
            validate_u64_field(retry, "llm.retry.max_retries", "max_retries", 0, 10)?;
            validate_u64_field(
                retry,
                "llm.retry.initial_delay_ms",
                "initial_delay_ms",
                1,
                60_000,
            )?;
            validate_u64_field(
                retry,
                "llm.retry.max_delay_ms",
                "max_delay_ms",
                1,
                600_000,
            )?;
            validate_bool_field(retry, "llm.retry.jitter", "jitter")?;
        }
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ResearchError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ResearchError::InvalidArgument(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ResearchError::InvalidArgument(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if allowed.contains(&text) {
        return Ok(());
    }
    Err(ResearchError::InvalidArgument(format!(
        "Invalid config at '{}': expected one of {}",
        path,
        allowed.join(", ")
    )))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ResearchError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ResearchError::InvalidArgument(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ResearchError {
    ResearchError::InvalidArgument(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_empty_and_complete_configs() {
        validate_config(&json!({})).unwrap();
        validate_config(&json!({
            "server": { "host": "0.0.0.0", "port": 8001, "cors_allowed_origins": ["http://localhost:3000"] },
            "store": { "embedding": { "provider": "hashing", "dimension": 256 } },
            "retrieval": { "default_top_k": 5 },
            "context": { "max_chars": 4000 },
            "llm": { "temperature": 0.1, "max_tokens": 1500, "retry": { "max_retries": 2, "jitter": false } }
        }))
        .unwrap();
    }

    #[test]
    fn rejects_out_of_range_and_mistyped_values() {
        let err = validate_config(&json!({ "retrieval": { "default_top_k": 0 } })).unwrap_err();
        assert!(err.to_string().contains("retrieval.default_top_k"));

        let err = validate_config(&json!({ "llm": { "temperature": "hot" } })).unwrap_err();
        assert!(err.to_string().contains("expected number"));

        let err = validate_config(&json!({ "store": { "embedding": { "provider": "chroma" } } }))
            .unwrap_err();
        assert!(err.to_string().contains("hashing, openai"));

        let err = validate_config(&json!({ "server": [] })).unwrap_err();
        assert!(err.to_string().contains("'server'"));
    }
}
