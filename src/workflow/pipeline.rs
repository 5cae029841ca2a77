//! 示例生成流水线
//!
//! 为同一检验并发派发 candidates 个候选任务，等待全部完成（屏障）后，
//! 按完成先后保留前 keep 个成功结果。失败任务记录在 failures 中，不影响其它任务。

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::SageError;
use crate::workflow::pool::WorkerPool;
use crate::workflow::types::{ExampleBatch, PipelineTask, TaskFailure, TaskOutcome};

/// 流水线：共享工作池，本身只负责派发与汇总
#[derive(Clone)]
pub struct ExamplePipeline {
    pool: Arc<WorkerPool>,
    candidates: usize,
    keep: usize,
}

impl ExamplePipeline {
    pub fn new(pool: Arc<WorkerPool>, candidates: usize, keep: usize) -> Self {
        Self {
            pool,
            candidates: candidates.max(1),
            keep,
        }
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// 生成一批示例
    pub async fn generate(&self, test_name: &str, situation: Option<&str>) -> Result<ExampleBatch, SageError> {
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(SageError::Config("test name must not be empty".into()));
        }
        let situation = situation.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let batch_id = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        for label in 0..self.candidates {
            let task = PipelineTask::batch_member(batch_id, label, test_name, situation.clone());
            self.pool.submit(task, tx.clone()).await?;
        }
        // 只留 worker 手中的发送端，全部完成或被丢弃后 recv 返回 None
        drop(tx);
        tracing::info!(%batch_id, test_name, candidates = self.candidates, "batch dispatched");

        let mut arrivals = Vec::with_capacity(self.candidates);
        while arrivals.len() < self.candidates {
            match rx.recv().await {
                Some(outcome) => arrivals.push(outcome),
                None => break,
            }
        }

        let batch = collect_batch(batch_id, test_name, situation, self.candidates, arrivals, self.keep);
        if batch.is_empty() {
            tracing::warn!(%batch_id, test_name, failures = batch.failures.len(), "batch produced no examples");
        } else {
            tracing::info!(
                %batch_id,
                kept = batch.examples.len(),
                discarded = batch.discarded,
                failures = batch.failures.len(),
                "batch collected"
            );
        }
        Ok(batch)
    }
}

/// 按到达顺序汇总：前 keep 个成功结果保留，其余成功计入 discarded
pub fn collect_batch(
    batch_id: Uuid,
    test_name: &str,
    situation: Option<String>,
    dispatched: usize,
    arrivals: Vec<TaskOutcome>,
    keep: usize,
) -> ExampleBatch {
    let mut examples = Vec::with_capacity(keep);
    let mut discarded = 0;
    let mut failures = Vec::new();

    for outcome in arrivals.into_iter().take(dispatched) {
        match outcome.result {
            Ok(example) if examples.len() < keep => examples.push(example),
            Ok(_) => discarded += 1,
            Err(e) => failures.push(TaskFailure {
                label: outcome.task.label,
                kind: e.kind(),
                message: e.to_string(),
                elapsed_ms: outcome.elapsed.as_millis() as u64,
            }),
        }
    }

    ExampleBatch {
        batch_id,
        test_name: test_name.to_string(),
        situation,
        dispatched,
        examples,
        discarded,
        failures,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::core::ErrorKind;
    use crate::skills::ExampleGenerator;
    use crate::types::TestExample;

    fn example(tag: &str) -> TestExample {
        TestExample {
            situation: tag.into(),
            test_name: "Student's t-test".into(),
            description: String::new(),
            assumption_descriptions: vec![],
            assumption_pass_statuses: vec![],
            check_assumptions: String::new(),
            apply_test: String::new(),
            notes: String::new(),
        }
    }

    /// 第 n 次调用（从 0 起）延迟 delays[n] 毫秒；fail 中的调用序号返回错误，hang 中的永不返回
    struct ScriptedGenerator {
        calls: AtomicUsize,
        delays: Vec<u64>,
        fail: Vec<usize>,
        hang: Vec<usize>,
    }

    impl ScriptedGenerator {
        fn new(delays: Vec<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delays,
                fail: vec![],
                hang: vec![],
            }
        }
    }

    #[async_trait]
    impl ExampleGenerator for ScriptedGenerator {
        async fn generate_example(&self, _: &str, _: Option<&str>) -> Result<TestExample, SageError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang.contains(&n) {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(Duration::from_millis(self.delays.get(n).copied().unwrap_or(1))).await;
            if self.fail.contains(&n) {
                return Err(SageError::Decode(format!("candidate {n} malformed")));
            }
            Ok(example(&format!("candidate-{n}")))
        }
    }

    fn pipeline(generator: ScriptedGenerator, task_timeout_ms: u64) -> ExamplePipeline {
        pipeline_with_token(generator, task_timeout_ms, CancellationToken::new())
    }

    fn pipeline_with_token(generator: ScriptedGenerator, task_timeout_ms: u64, cancel: CancellationToken) -> ExamplePipeline {
        let pool = WorkerPool::spawn(Arc::new(generator), 10, Duration::from_millis(task_timeout_ms), cancel);
        ExamplePipeline::new(Arc::new(pool), 5, 3)
    }

    #[tokio::test]
    async fn test_all_succeed_keeps_first_three_arrivals() {
        // 调用序号与派发顺序一致；延迟决定到达顺序 4,3,2,1,0
        let p = pipeline(ScriptedGenerator::new(vec![250, 200, 150, 100, 50]), 5_000);
        let batch = p.generate("Student's t-test", Some("compare two groups")).await.unwrap();
        assert_eq!(batch.dispatched, 5);
        let kept: Vec<_> = batch.examples.iter().map(|e| e.situation.as_str()).collect();
        assert_eq!(kept, vec!["candidate-4", "candidate-3", "candidate-2"]);
        assert_eq!(batch.discarded, 2);
        assert!(batch.failures.is_empty());
        assert_eq!(batch.situation.as_deref(), Some("compare two groups"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_survivors() {
        let mut g = ScriptedGenerator::new(vec![10; 5]);
        g.fail = vec![0, 1, 2];
        let batch = pipeline(g, 5_000).generate("ANOVA", None).await.unwrap();
        assert_eq!(batch.examples.len(), 2);
        assert_eq!(batch.failures.len(), 3);
        assert!(batch.failures.iter().all(|f| f.kind == ErrorKind::Decode));
    }

    #[tokio::test]
    async fn test_total_failure_yields_empty_batch() {
        let mut g = ScriptedGenerator::new(vec![1; 5]);
        g.fail = (0..5).collect();
        let batch = pipeline(g, 5_000).generate("ANOVA", None).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.failures.len(), 5);
    }

    #[tokio::test]
    async fn test_hung_candidate_times_out_without_blocking_batch() {
        let mut g = ScriptedGenerator::new(vec![1; 5]);
        g.hang = vec![2];
        let batch = pipeline(g, 100).generate("ANOVA", None).await.unwrap();
        assert_eq!(batch.examples.len(), 3);
        assert_eq!(batch.discarded, 1);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_completes_with_cancelled_failures() {
        let mut g = ScriptedGenerator::new(vec![1; 5]);
        g.hang = (0..5).collect();
        let cancel = CancellationToken::new();
        let p = pipeline_with_token(g, 60_000, cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let batch = tokio::time::timeout(Duration::from_secs(5), p.generate("ANOVA", None))
            .await
            .expect("batch should finish after cancellation")
            .unwrap();
        trigger.await.unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.dispatched, 5);
        assert_eq!(batch.failures.len(), 5);
        assert!(batch.failures.iter().all(|f| f.kind == ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_test_name_rejected() {
        let g = ScriptedGenerator::new(vec![]);
        let err = pipeline(g, 100).generate("   ", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_collect_caps_to_dispatched() {
        let id = Uuid::new_v4();
        let arrivals = (0..4)
            .map(|n| TaskOutcome {
                task: PipelineTask::batch_member(id, n, "ANOVA", None),
                result: Ok(example(&n.to_string())),
                elapsed: Duration::from_millis(5),
            })
            .collect();
        let batch = collect_batch(id, "ANOVA", None, 2, arrivals, 3);
        assert_eq!(batch.examples.len(), 2);
        assert_eq!(batch.discarded, 0);
    }
}
