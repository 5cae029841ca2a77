//! 工作流类型定义
//!
//! 任务（PipelineTask）、任务结果（TaskOutcome）与批次汇总（ExampleBatch）

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::{ErrorKind, SageError};
use crate::types::TestExample;

/// 任务来源：单独请求，或某个批次的成员
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOrigin {
    Standalone,
    BatchMember { batch_id: Uuid },
}

/// 一个候选示例生成任务
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTask {
    /// 批次内序号（Standalone 为 0）
    pub label: usize,
    pub test_name: String,
    pub situation: Option<String>,
    pub origin: TaskOrigin,
}

impl PipelineTask {
    pub fn standalone(test_name: impl Into<String>, situation: Option<String>) -> Self {
        Self {
            label: 0,
            test_name: test_name.into(),
            situation,
            origin: TaskOrigin::Standalone,
        }
    }

    pub fn batch_member(batch_id: Uuid, label: usize, test_name: impl Into<String>, situation: Option<String>) -> Self {
        Self {
            label,
            test_name: test_name.into(),
            situation,
            origin: TaskOrigin::BatchMember { batch_id },
        }
    }
}

/// 任务完成（成功、失败、超时或取消）后的结果
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: PipelineTask,
    pub result: Result<TestExample, SageError>,
    pub elapsed: Duration,
}

/// 单个失败任务的摘要
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub label: usize,
    pub kind: ErrorKind,
    pub message: String,
    pub elapsed_ms: u64,
}

/// 一批候选示例的汇总结果：保留的示例按完成顺序排列
#[derive(Debug, Clone, Serialize)]
pub struct ExampleBatch {
    pub batch_id: Uuid,
    pub test_name: String,
    pub situation: Option<String>,
    /// 派发的任务数
    pub dispatched: usize,
    pub examples: Vec<TestExample>,
    /// 成功但超出保留数而被丢弃的个数
    pub discarded: usize,
    pub failures: Vec<TaskFailure>,
    pub created_at: DateTime<Utc>,
}

impl ExampleBatch {
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}
