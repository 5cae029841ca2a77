//! Baseten 托管模型客户端（JSON Schema 约束输出）
//!
//! POST https://model-{id}.api.baseten.co/production/predict，Header `Authorization: Api-Key ...`；
//! 响应体即生成的对象本身。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::SageError;
use crate::llm::transport::{Header, HttpTransport};
use crate::llm::StructuredBackend;

pub const BASETEN_SYSTEM_PROMPT: &str = "You are a helpful assistant for answering questions about statistics. \
You answer by transforming input text into specific schemas. \
Your job is to take input from the user along with a schema, and transform the input into the schema.";

pub struct BasetenClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    api_key: String,
    max_tokens: u32,
}

impl BasetenClient {
    /// endpoint 未指定时由 model_id 拼出默认地址
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        model_id: Option<&str>,
        endpoint: Option<&str>,
        api_key: Option<&str>,
        max_tokens: u32,
    ) -> Result<Self, SageError> {
        let endpoint = match (endpoint, model_id) {
            (Some(e), _) => e.to_string(),
            (None, Some(id)) => format!("https://model-{id}.api.baseten.co/production/predict"),
            (None, None) => {
                return Err(SageError::Config(
                    "llm.baseten.model_id or llm.baseten.endpoint must be set".into(),
                ))
            }
        };
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("BASETEN_API_KEY").ok())
            .unwrap_or_default();
        Ok(Self {
            transport,
            endpoint,
            api_key,
            max_tokens,
        })
    }

    fn headers(&self) -> Vec<Header> {
        vec![("Authorization".to_string(), format!("Api-Key {}", self.api_key))]
    }

    fn payload(&self, prompt: &str, context: Option<&str>, schema: &Value) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": BASETEN_SYSTEM_PROMPT })];
        if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
            messages.push(json!({
                "role": "user",
                "content": format!("The context for the query is: {ctx}"),
            }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        json!({
            "messages": messages,
            "max_tokens": self.max_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "schema": schema },
            },
        })
    }
}

#[async_trait]
impl StructuredBackend for BasetenClient {
    async fn generate_json(
        &self,
        prompt: &str,
        context: Option<&str>,
        schema: &Value,
    ) -> Result<String, SageError> {
        let body = self.payload(prompt, context, schema);
        self.transport.post_json(&self.endpoint, &self.headers(), &body).await
    }

    fn name(&self) -> &str {
        "baseten"
    }
}
