//! Hypothesis Sage - 基于维基百科统计条目检索的统计学助手
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、应用装配、优雅关闭
//! - **llm**: 文本模型（Cohere / OpenAI 兼容 / Mock）与结构化生成（Baseten / Cohere）
//! - **retrieval**: 嵌入 + 向量索引（Pinecone / 内存）
//! - **skills**: query_db、explain、find_test、test_example
//! - **workflow**: 工作池、示例生成流水线、操作路由
//! - **observability**: tracing 日志初始化
//! - **ui**: ratatui 表格渲染
//! - **commands**: CLI 子命令对应的库函数

pub mod commands;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod retrieval;
pub mod skills;
pub mod types;
pub mod ui;
pub mod workflow;

pub use crate::core::{AppBuilder, ErrorKind, SageError};
pub use types::{Assumption, FindTestResponse, TestExample, TestRecommendation};
pub use workflow::{ExampleBatch, Operation, StatisticsWorkflow, WorkflowOutcome};
