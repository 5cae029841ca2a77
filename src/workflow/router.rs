//! 操作路由：自由文本 → Operation
//!
//! 分类只做一次外部 LLM 调用：Cohere 原生工具调用（取第一个 tool call），
//! 或任意 LlmClient 按约定返回 `{"operation": "...", "arguments": {...}}`。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::SageError;
use crate::llm::{CohereClient, LlmClient, Message};

/// 可路由的操作（封闭集合）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    QueryDb { query: String },
    FindTest { situation: String },
    TestExample { test_name: String, situation: Option<String> },
    Explain { query: String },
    MakeLotsOfExamples { test_name: String, situation: Option<String> },
}

impl Operation {
    pub const ALL_NAMES: [&'static str; 5] = [
        "query_db",
        "find_test",
        "test_example",
        "explain",
        "make_lots_of_examples",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::QueryDb { .. } => "query_db",
            Operation::FindTest { .. } => "find_test",
            Operation::TestExample { .. } => "test_example",
            Operation::Explain { .. } => "explain",
            Operation::MakeLotsOfExamples { .. } => "make_lots_of_examples",
        }
    }

    /// 由工具名 + 参数构造；未知工具名为 UnknownOperation，缺必填参数为 Decode
    pub fn from_tool_call(name: &str, params: &Map<String, Value>) -> Result<Self, SageError> {
        let required = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .ok_or_else(|| SageError::Decode(format!("tool call '{name}' is missing argument '{key}'")))
        };
        let optional = |key: &str| {
            params
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        match name {
            "query_db" => Ok(Operation::QueryDb { query: required("query")? }),
            "find_test" => Ok(Operation::FindTest {
                situation: required("situation")?,
            }),
            "test_example" => Ok(Operation::TestExample {
                test_name: required("test_name")?,
                situation: optional("situation"),
            }),
            "explain" => Ok(Operation::Explain { query: required("query")? }),
            "make_lots_of_examples" => Ok(Operation::MakeLotsOfExamples {
                test_name: required("test_name")?,
                situation: optional("situation"),
            }),
            other => Err(SageError::UnknownOperation(other.to_string())),
        }
    }
}

fn string_param(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

/// 发给分类器的工具定义（名称、描述、JSON 参数）
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "query_db",
            "description": "Queries a database using an embedding model and returns relevant results.",
            "parameters": {
                "type": "object",
                "properties": { "query": string_param("The query to search for in the database.") },
                "required": ["query"],
            },
        }),
        json!({
            "name": "find_test",
            "description": "Finds a test for a given situation.",
            "parameters": {
                "type": "object",
                "properties": { "situation": string_param("The situation to find a test for.") },
                "required": ["situation"],
            },
        }),
        json!({
            "name": "test_example",
            "description": "Creates a single example test for a given test name and situation.",
            "parameters": {
                "type": "object",
                "properties": {
                    "test_name": string_param("The name of the test to create an example for."),
                    "situation": string_param("The situation to create an example for."),
                },
                "required": ["test_name", "situation"],
            },
        }),
        json!({
            "name": "explain",
            "description": "Explains a statistical concept described by the query.",
            "parameters": {
                "type": "object",
                "properties": { "query": string_param("The query to explain.") },
                "required": ["query"],
            },
        }),
        json!({
            "name": "make_lots_of_examples",
            "description": "Creates several examples for a given test name and situation.",
            "parameters": {
                "type": "object",
                "properties": {
                    "test_name": string_param("The name of the test to create examples for."),
                    "situation": string_param("The situation to create examples for."),
                },
                "required": ["test_name"],
            },
        }),
    ]
}

/// 操作分类器
#[async_trait]
pub trait OperationClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<Operation, SageError>;
}

/// Cohere 工具调用分类：取第一个 tool call
pub struct CohereClassifier {
    client: Arc<CohereClient>,
}

impl CohereClassifier {
    pub fn new(client: Arc<CohereClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OperationClassifier for CohereClassifier {
    async fn classify(&self, query: &str) -> Result<Operation, SageError> {
        let calls = self.client.tool_calls(query, &tool_definitions()).await?;
        let first = calls
            .into_iter()
            .next()
            .ok_or_else(|| SageError::UnknownOperation("model returned no tool call".into()))?;
        let op = Operation::from_tool_call(&first.name, &first.parameters)?;
        tracing::info!(operation = op.name(), "classified query");
        Ok(op)
    }
}

#[derive(Deserialize)]
struct ChatRouting {
    operation: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

/// 基于普通对话模型的分类：system prompt 中给出工具定义，要求只输出 JSON
pub struct ChatClassifier {
    llm: Arc<dyn LlmClient>,
}

impl ChatClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn system_prompt() -> String {
        let tools = serde_json::to_string_pretty(&tool_definitions()).unwrap_or_default();
        format!(
            "You route statistics questions to exactly one operation.\n\
             Available operations:\n```json\n{tools}\n```\n\
             Answer with a single JSON object and nothing else: \
             {{\"operation\": \"<name>\", \"arguments\": {{...}}}}"
        )
    }
}

/// 从模型输出中提取 JSON 块（```json ... ``` 或首个 { 到末个 }）
fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

pub fn parse_chat_routing(output: &str) -> Result<Operation, SageError> {
    let json_str = extract_json(output)
        .ok_or_else(|| SageError::Decode(format!("classifier reply has no JSON object: {output}")))?;
    let routing: ChatRouting =
        serde_json::from_str(json_str).map_err(|e| SageError::Decode(format!("{e}: {json_str}")))?;
    Operation::from_tool_call(&routing.operation, &routing.arguments)
}

#[async_trait]
impl OperationClassifier for ChatClassifier {
    async fn classify(&self, query: &str) -> Result<Operation, SageError> {
        let messages = vec![Message::system(Self::system_prompt()), Message::user(query)];
        let reply = self.llm.complete(&messages).await?;
        let op = parse_chat_routing(&reply)?;
        tracing::info!(llm = self.llm.name(), operation = op.name(), "classified query");
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::transport::stub::StubTransport;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_tool_definitions_cover_all_operations() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, Operation::ALL_NAMES);
    }

    #[test]
    fn test_from_tool_call_maps_arguments() {
        let op = Operation::from_tool_call(
            "make_lots_of_examples",
            &params(json!({"test_name": "Student's t-test", "situation": ""})),
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::MakeLotsOfExamples {
                test_name: "Student's t-test".into(),
                situation: None
            }
        );
        assert_eq!(op.name(), "make_lots_of_examples");
    }

    #[test]
    fn test_unknown_tool_and_missing_argument() {
        let err = Operation::from_tool_call("delete_index", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
        let err = Operation::from_tool_call("explain", &Map::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_parse_chat_routing_with_fence() {
        let reply = "Sure:\n```json\n{\"operation\": \"find_test\", \"arguments\": {\"situation\": \"paired samples\"}}\n```";
        assert_eq!(
            parse_chat_routing(reply).unwrap(),
            Operation::FindTest {
                situation: "paired samples".into()
            }
        );
        assert!(parse_chat_routing("I cannot help").is_err());
    }

    #[tokio::test]
    async fn test_cohere_classifier_takes_first_tool_call() {
        let body = r#"{"text": "", "tool_calls": [
            {"name": "explain", "parameters": {"query": "p-value"}},
            {"name": "query_db", "parameters": {"query": "p-value"}}
        ]}"#;
        let transport = Arc::new(StubTransport::new().respond(body));
        let client = CohereClient::new(transport.clone(), "https://api.cohere.test/v1", "command-r-plus", Some("k"), 0.1);
        let op = CohereClassifier::new(Arc::new(client)).classify("what is a p-value").await.unwrap();
        assert_eq!(op, Operation::Explain { query: "p-value".into() });

        let req = transport.last_request().unwrap();
        assert_eq!(req.body.unwrap()["tools"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_cohere_classifier_no_tool_call() {
        let transport = Arc::new(StubTransport::new().respond(r#"{"text": "hello"}"#));
        let client = CohereClient::new(transport, "https://api.cohere.test/v1", "command-r-plus", Some("k"), 0.1);
        let err = CohereClassifier::new(Arc::new(client)).classify("hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }
}
