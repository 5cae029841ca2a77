//! 错误类型与分类
//!
//! 单次调用（检索 / 生成）的错误原样向上传播；示例生成流水线把单个任务的错误吸收进
//! `ExampleBatch::failures`，调用方可按 [`ErrorKind`] 区分传输、解码、Schema 校验等失败。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// 检索、生成、路由过程中可能出现的错误
#[derive(Error, Debug)]
pub enum SageError {
    /// 网络层失败（连接、超时、TLS 等）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 服务端返回非 2xx
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 响应体无法解析为预期的结构
    #[error("Malformed response: {0}")]
    Decode(String),

    /// JSON 可解析，但字段缺失或类型不符
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Config error: {0}")]
    Config(String),

    /// Cohere JSON 模式的 Schema 嵌套过深，请求不会发出
    #[error("JSON schema depth {depth} exceeds the maximum of {max} levels")]
    SchemaTooDeep { depth: usize, max: usize },

    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    #[error("Task cancelled")]
    Cancelled,

    /// 分类器返回了未知的操作名
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

/// 错误大类：供流水线汇总失败原因、供测试断言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Decode,
    Schema,
    Configuration,
    Timeout,
    Cancelled,
    Routing,
}

impl SageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SageError::Transport(_) | SageError::HttpStatus { .. } => ErrorKind::Transport,
            SageError::Decode(_) => ErrorKind::Decode,
            SageError::SchemaValidation(_) => ErrorKind::Schema,
            SageError::Config(_) | SageError::SchemaTooDeep { .. } => ErrorKind::Configuration,
            SageError::Timeout(_) => ErrorKind::Timeout,
            SageError::Cancelled => ErrorKind::Cancelled,
            SageError::UnknownOperation(_) => ErrorKind::Routing,
        }
    }

    /// 传输层错误（含 HTTP 状态码错误）
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<reqwest::Error> for SageError {
    fn from(e: reqwest::Error) -> Self {
        SageError::Transport(e.to_string())
    }
}
