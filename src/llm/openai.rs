use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::GenerationError;

/// Any endpoint speaking the OpenAI chat-completions dialect.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        match self.authorized(self.client.get(&url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(GenerationError::from_reqwest)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = res.json().await.map_err(GenerationError::from_reqwest)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })?;

        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("Hello"),
        ])
        .with_temperature(0.1)
        .with_max_tokens(50)
    }

    #[tokio::test]
    async fn parses_completion_and_sends_sampling_parameters() {
        let seen: Arc<Mutex<Option<(Value, Option<String>)>>> = Arc::new(Mutex::new(None));
        let seen_in_handler = seen.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *seen.lock().unwrap() = Some((body, auth));
                    Json(json!({
                        "choices": [ { "message": { "role": "assistant", "content": "  Cited answer.  " } } ]
                    }))
                }
            }),
        );
        let base_url = serve(router).await;
        let provider = OpenAiCompatibleProvider::new(base_url, Some("sk-test".to_string()));

        let answer = provider.chat(request(), "gpt-test").await.unwrap();
        assert_eq!(answer, "Cited answer.");

        let (body, auth) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body.get("stop").is_none());
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn maps_http_failures_to_classified_errors() {
        let router = Router::new()
            .route(
                "/limited/v1/chat/completions",
                post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/denied/v1/chat/completions",
                post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
            )
            .route(
                "/empty/v1/chat/completions",
                post(|| async { Json(json!({ "choices": [] })) }),
            );
        let base_url = serve(router).await;

        let limited = OpenAiCompatibleProvider::new(format!("{}/limited", base_url), None);
        let err = limited.chat(request(), "m").await.unwrap_err();
        assert_eq!(
            err,
            GenerationError::Status {
                code: 429,
                body: "slow down".to_string()
            }
        );
        assert!(err.is_retryable());

        let denied = OpenAiCompatibleProvider::new(format!("{}/denied", base_url), None);
        let err = denied.chat(request(), "m").await.unwrap_err();
        assert!(!err.is_retryable());

        let empty = OpenAiCompatibleProvider::new(format!("{}/empty", base_url), None);
        let err = empty.chat(request(), "m").await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = OpenAiCompatibleProvider::new(format!("http://{}", addr), None);
        let err = provider.chat(request(), "m").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
        assert!(err.is_retryable());
        assert!(!provider.health_check().await);
    }

    #[tokio::test]
    async fn health_check_reports_reachable_endpoint() {
        let router = Router::new().route("/v1/models", get(|| async { Json(json!({ "data": [] })) }));
        let base_url = serve(router).await;

        let provider = OpenAiCompatibleProvider::new(format!("{}/", base_url), None);
        assert!(provider.health_check().await);
    }
}
