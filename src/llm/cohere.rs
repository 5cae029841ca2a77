//! Cohere Chat API 客户端（v1 /chat）
//!
//! - 文本模式：explain 的回答生成，system 消息拼成 preamble
//! - JSON 模式：response_format = json_object + schema；发请求前检查 Schema 深度（> 5 直接拒绝）
//! - 工具调用：把候选工具定义交给模型，只取其选择（用于 ask 的路由分类）

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::SageError;
use crate::llm::schema::{json_depth, MAX_SCHEMA_DEPTH};
use crate::llm::transport::{Header, HttpTransport};
use crate::llm::{LlmClient, Message, Role, StructuredBackend};

/// 默认 system prompt（preamble）
pub const COHERE_SYSTEM_PROMPT: &str =
    "You are a helpful assistant for answering questions about statistics.";

/// Cohere 返回的单个工具调用
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Cohere 客户端：持有传输层、API Key、模型名与温度
pub struct CohereClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl CohereClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        temperature: f32,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("COHERE_API_KEY").ok())
            .unwrap_or_default();
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
        }
    }

    fn headers(&self) -> Vec<Header> {
        vec![
            ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            ("Accept".to_string(), "application/json".to_string()),
        ]
    }

    async fn chat(&self, body: Value) -> Result<ChatResponse, SageError> {
        let url = format!("{}/chat", self.base_url);
        let raw = self.transport.post_json(&url, &self.headers(), &body).await?;
        serde_json::from_str(&raw).map_err(|e| SageError::Decode(format!("cohere chat response: {e}")))
    }

    /// 构建 preamble：基础 system prompt + 可选上下文
    fn preamble(system: &str, context: Option<&str>) -> String {
        let mut preamble = system.to_string();
        if let Some(ctx) = context.filter(|c| !c.trim().is_empty()) {
            preamble.push_str(&format!(" The context for the query is: {ctx}"));
        }
        preamble
    }

    /// 单次 chat 请求（JSON 模式时要求提供 schema）
    pub async fn respond(
        &self,
        query: &str,
        context: Option<&str>,
        json_schema: Option<&Value>,
        enforce_json: bool,
    ) -> Result<String, SageError> {
        let mut preamble = Self::preamble(COHERE_SYSTEM_PROMPT, context);
        let response_format = if enforce_json {
            let schema = json_schema.ok_or_else(|| {
                SageError::Config("a JSON schema must be provided when JSON output is enforced".into())
            })?;
            let depth = json_depth(schema);
            if depth > MAX_SCHEMA_DEPTH {
                return Err(SageError::SchemaTooDeep {
                    depth,
                    max: MAX_SCHEMA_DEPTH,
                });
            }
            preamble.push_str(" You must generate syntactically correct JSON.");
            json!({ "type": "json_object", "schema": schema })
        } else {
            json!({ "type": "text" })
        };

        let body = json!({
            "model": self.model,
            "preamble": preamble,
            "message": query,
            "response_format": response_format,
            "temperature": self.temperature,
        });
        Ok(self.chat(body).await?.text)
    }

    /// 让模型在给定工具中选择，返回其工具调用（可能为空）
    pub async fn tool_calls(&self, query: &str, tools: &[Value]) -> Result<Vec<ToolCall>, SageError> {
        let body = json!({
            "model": self.model,
            "message": query,
            "tools": tools,
        });
        Ok(self.chat(body).await?.tool_calls.unwrap_or_default())
    }
}

#[async_trait]
impl LlmClient for CohereClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, SageError> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let message = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let preamble = if system.is_empty() {
            COHERE_SYSTEM_PROMPT.to_string()
        } else {
            system.join("\n")
        };
        let body = json!({
            "model": self.model,
            "preamble": preamble,
            "message": message,
            "response_format": { "type": "text" },
            "temperature": self.temperature,
        });
        Ok(self.chat(body).await?.text)
    }

    fn name(&self) -> &str {
        "cohere"
    }
}

#[async_trait]
impl StructuredBackend for CohereClient {
    async fn generate_json(
        &self,
        prompt: &str,
        context: Option<&str>,
        schema: &Value,
    ) -> Result<String, SageError> {
        self.respond(prompt, context, Some(schema), true).await
    }

    fn name(&self) -> &str {
        "cohere"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::schema::schema_value;
    use crate::llm::transport::stub::StubTransport;
    use crate::llm::GenerationClient;
    use crate::types::{FindTestResponse, TestExample};

    fn client(transport: Arc<StubTransport>) -> CohereClient {
        CohereClient::new(transport, "https://cohere.test/v1/", "command-r-plus", Some("k"), 0.1)
    }

    #[tokio::test]
    async fn test_too_deep_schema_never_hits_network() {
        let transport = Arc::new(StubTransport::new().respond(r#"{"text": "{}"}"#));
        let gen = GenerationClient::new(Arc::new(client(transport.clone())));

        let err = gen.generate::<FindTestResponse>("find a test", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, SageError::SchemaTooDeep { max: 5, .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_json_mode_without_schema_is_config_error() {
        let transport = Arc::new(StubTransport::new());
        let c = client(transport.clone());
        let err = c.respond("q", None, None, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_json_mode_request_shape() {
        let payload = json!({
            "situation": "s", "test_name": "Mann-Whitney U test", "description": "d",
            "assumption_descriptions": ["Independent samples"], "assumption_pass_statuses": [true],
            "check_assumptions": "c", "apply_test": "a", "notes": "n"
        });
        let body = json!({ "text": payload.to_string() }).to_string();
        let transport = Arc::new(StubTransport::new().respond(body));
        let gen = GenerationClient::new(Arc::new(client(transport.clone())));

        let ex: TestExample = gen.generate("make an example", Some("ranks")).await.unwrap();
        assert_eq!(ex.test_name, "Mann-Whitney U test");

        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "https://cohere.test/v1/chat");
        let sent = req.body.unwrap();
        assert_eq!(sent["response_format"]["type"], "json_object");
        assert_eq!(sent["response_format"]["schema"], schema_value::<TestExample>());
        let preamble = sent["preamble"].as_str().unwrap();
        assert!(preamble.contains("The context for the query is: ranks"));
        assert!(preamble.ends_with("You must generate syntactically correct JSON."));
    }

    #[tokio::test]
    async fn test_tool_calls_parsed() {
        let body = r#"{"text": "", "tool_calls": [{"name": "explain", "parameters": {"query": "p-value"}}]}"#;
        let transport = Arc::new(StubTransport::new().respond(body));
        let calls = client(transport).tool_calls("what is a p-value", &[]).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "explain");
        assert_eq!(calls[0].parameters["query"], "p-value");
    }

    #[tokio::test]
    async fn test_complete_uses_system_as_preamble() {
        let transport = Arc::new(StubTransport::new().respond(r#"{"text": "A p-value is..."}"#));
        let c = client(transport.clone());
        let out = c
            .complete(&[Message::system("sys"), Message::user("what is a p-value")])
            .await
            .unwrap();
        assert_eq!(out, "A p-value is...");
        let sent = transport.last_request().unwrap().body.unwrap();
        assert_eq!(sent["preamble"], "sys");
        assert_eq!(sent["message"], "what is a p-value");
    }
}
