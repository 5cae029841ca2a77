//! 统计工作流：分类一次 → 模式匹配 → 执行对应技能
//!
//! 单个示例（TestExample）与批量示例共用同一工作池；整次运行受 workflow_timeout 约束。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineSection;
use crate::core::SageError;
use crate::retrieval::RetrievalMatch;
use crate::skills::StatSkills;
use crate::types::{FindTestResponse, TestExample};
use crate::workflow::pipeline::ExamplePipeline;
use crate::workflow::pool::WorkerPool;
use crate::workflow::router::{Operation, OperationClassifier};
use crate::workflow::types::{ExampleBatch, PipelineTask};

/// 一次工作流运行的结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Matches(Vec<RetrievalMatch>),
    Tests(FindTestResponse),
    Example(TestExample),
    Explanation(String),
    Examples(ExampleBatch),
}

pub struct StatisticsWorkflow {
    skills: StatSkills,
    classifier: Arc<dyn OperationClassifier>,
    pool: Arc<WorkerPool>,
    pipeline: ExamplePipeline,
    workflow_timeout: Duration,
}

impl StatisticsWorkflow {
    /// 创建工作流并启动工作池
    pub fn new(
        skills: StatSkills,
        classifier: Arc<dyn OperationClassifier>,
        settings: &PipelineSection,
        cancel: CancellationToken,
    ) -> Self {
        let pool = Arc::new(WorkerPool::spawn(
            Arc::new(skills.clone()),
            settings.workers,
            settings.task_timeout(),
            cancel,
        ));
        let pipeline = ExamplePipeline::new(Arc::clone(&pool), settings.candidates, settings.keep);
        Self {
            skills,
            classifier,
            pool,
            pipeline,
            workflow_timeout: settings.workflow_timeout(),
        }
    }

    pub fn skills(&self) -> &StatSkills {
        &self.skills
    }

    pub fn pipeline(&self) -> &ExamplePipeline {
        &self.pipeline
    }

    /// 单个示例：经工作池执行（来源 Standalone），同样受单任务超时约束
    pub async fn single_example(&self, test_name: &str, situation: Option<&str>) -> Result<TestExample, SageError> {
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(SageError::Config("test name must not be empty".into()));
        }
        let task = PipelineTask::standalone(test_name, situation.map(String::from));
        self.pool.run_one(task).await
    }

    /// 自由文本入口
    pub async fn run(&self, query: &str) -> Result<WorkflowOutcome, SageError> {
        timeout(self.workflow_timeout, self.run_inner(query))
            .await
            .unwrap_or(Err(SageError::Timeout(self.workflow_timeout)))
    }

    async fn run_inner(&self, query: &str) -> Result<WorkflowOutcome, SageError> {
        let op = self.classifier.classify(query).await?;
        self.dispatch(op).await
    }

    /// 执行已确定的操作
    pub async fn dispatch(&self, op: Operation) -> Result<WorkflowOutcome, SageError> {
        tracing::info!(operation = op.name(), "dispatching operation");
        match op {
            Operation::QueryDb { query } => self.skills.query_db(&query, None).await.map(WorkflowOutcome::Matches),
            Operation::FindTest { situation } => self.skills.find_test(&situation).await.map(WorkflowOutcome::Tests),
            Operation::TestExample { test_name, situation } => self
                .single_example(&test_name, situation.as_deref())
                .await
                .map(WorkflowOutcome::Example),
            Operation::Explain { query } => self.skills.explain(&query).await.map(WorkflowOutcome::Explanation),
            Operation::MakeLotsOfExamples { test_name, situation } => self
                .pipeline
                .generate(&test_name, situation.as_deref())
                .await
                .map(WorkflowOutcome::Examples),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::{GenerationClient, MockLlmClient, StructuredBackend};
    use crate::retrieval::{Embedder, InMemoryIndex, RetrievalClient};

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        async fn embed_query(&self, _: &str) -> Result<Vec<f32>, SageError> {
            Ok(vec![1.0])
        }
    }

    struct ExampleBackend;

    #[async_trait]
    impl StructuredBackend for ExampleBackend {
        async fn generate_json(&self, _: &str, _: Option<&str>, _: &Value) -> Result<String, SageError> {
            Ok(serde_json::json!({
                "situation": "s", "test_name": "ANOVA", "description": "d",
                "assumption_descriptions": ["normality"], "assumption_pass_statuses": [true],
                "check_assumptions": "c", "apply_test": "a", "notes": "n"
            })
            .to_string())
        }

        fn name(&self) -> &str {
            "example"
        }
    }

    struct FixedClassifier(Operation);

    #[async_trait]
    impl OperationClassifier for FixedClassifier {
        async fn classify(&self, _: &str) -> Result<Operation, SageError> {
            Ok(self.0.clone())
        }
    }

    struct StuckClassifier;

    #[async_trait]
    impl OperationClassifier for StuckClassifier {
        async fn classify(&self, _: &str) -> Result<Operation, SageError> {
            std::future::pending().await
        }
    }

    fn workflow(classifier: Arc<dyn OperationClassifier>, workflow_timeout_secs: u64) -> StatisticsWorkflow {
        let retrieval = RetrievalClient::new(Arc::new(FlatEmbedder), Arc::new(InMemoryIndex::default()), 5);
        let skills = StatSkills::new(
            retrieval,
            Arc::new(MockLlmClient),
            GenerationClient::new(Arc::new(ExampleBackend)),
        );
        let settings = PipelineSection {
            workflow_timeout_secs,
            ..PipelineSection::default()
        };
        StatisticsWorkflow::new(skills, classifier, &settings, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_make_lots_of_examples_runs_pipeline() {
        let op = Operation::MakeLotsOfExamples {
            test_name: "ANOVA".into(),
            situation: None,
        };
        let wf = workflow(Arc::new(FixedClassifier(op)), 240);
        match wf.run("make me several ANOVA examples").await.unwrap() {
            WorkflowOutcome::Examples(batch) => {
                assert_eq!(batch.dispatched, 5);
                assert_eq!(batch.examples.len(), 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_explain_goes_to_text_llm() {
        let op = Operation::Explain {
            query: "What is a p-value?".into(),
        };
        let wf = workflow(Arc::new(FixedClassifier(op)), 240);
        match wf.run("explain p-values").await.unwrap() {
            WorkflowOutcome::Explanation(text) => assert_eq!(text, "Echo from Mock: What is a p-value?"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_example_uses_pool() {
        let wf = workflow(Arc::new(StuckClassifier), 240);
        let ex = wf.single_example("ANOVA", Some("three diets")).await.unwrap();
        assert_eq!(ex.assumptions().len(), 1);
        let err = wf.single_example(" ", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test(start_paused = true)]
    async fn test_workflow_timeout() {
        let wf = workflow(Arc::new(StuckClassifier), 240);
        let err = wf.run("anything").await.unwrap_err();
        assert!(matches!(err, SageError::Timeout(d) if d == Duration::from_secs(240)));
    }
}
