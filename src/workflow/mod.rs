//! 工作流：工作池、示例生成流水线、操作路由与统计工作流

pub mod engine;
pub mod pipeline;
pub mod pool;
pub mod router;
pub mod types;

pub use engine::{StatisticsWorkflow, WorkflowOutcome};
pub use pipeline::ExamplePipeline;
pub use pool::WorkerPool;
pub use router::{tool_definitions, ChatClassifier, CohereClassifier, Operation, OperationClassifier};
pub use types::{ExampleBatch, PipelineTask, TaskFailure, TaskOrigin, TaskOutcome};
