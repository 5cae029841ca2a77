//! Mock LLM 客户端（用于测试与离线调试，无需 API）
//!
//! 取最后一条 User 消息原样回显。

use async_trait::async_trait;

use crate::core::SageError;
use crate::llm::{LlmClient, Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, SageError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {last_user}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
