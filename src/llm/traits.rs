//! LLM 客户端抽象
//!
//! 文本后端（Cohere / OpenAI 兼容 / Mock）实现 LlmClient；结构化后端（Baseten / Cohere JSON 模式）
//! 实现 StructuredBackend，只负责拿回原始 JSON 文本，校验由 GenerationClient 统一完成。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::SageError;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 文本补全客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，返回模型的文本回复
    async fn complete(&self, messages: &[Message]) -> Result<String, SageError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str;
}

/// 结构化生成后端：按 Schema 约束生成，返回未校验的 JSON 文本
#[async_trait]
pub trait StructuredBackend: Send + Sync {
    async fn generate_json(
        &self,
        prompt: &str,
        context: Option<&str>,
        schema: &Value,
    ) -> Result<String, SageError>;

    fn name(&self) -> &str;
}
