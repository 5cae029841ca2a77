//! 固定大小的工作池
//!
//! 任务以 PipelineTask 对象放入有界 mpsc 通道，由 N 个 worker 竞争消费；每个任务受超时约束，
//! 并监听取消令牌（Ctrl+C）。结果经调用方提供的回传通道送回，回传通道关闭不影响 worker。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::SageError;
use crate::skills::ExampleGenerator;
use crate::types::TestExample;
use crate::workflow::types::{PipelineTask, TaskOutcome};

struct Job {
    task: PipelineTask,
    reply: mpsc::UnboundedSender<TaskOutcome>,
}

/// 工作池：持有任务发送端与 worker 句柄
pub struct WorkerPool {
    task_tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 启动 workers 个 worker（至少 1 个）
    pub fn spawn(
        generator: Arc<dyn ExampleGenerator>,
        workers: usize,
        task_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let workers = workers.max(1);
        let (task_tx, task_rx) = mpsc::channel::<Job>(workers * 4);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let handles = (0..workers)
            .map(|worker_id| {
                let rx = Arc::clone(&task_rx);
                let generator = Arc::clone(&generator);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, rx, generator, task_timeout, cancel).await;
                })
            })
            .collect();

        tracing::debug!(workers, ?task_timeout, "worker pool started");
        Self {
            task_tx,
            workers: handles,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// 提交任务；结果稍后经 reply 送回
    pub async fn submit(
        &self,
        task: PipelineTask,
        reply: mpsc::UnboundedSender<TaskOutcome>,
    ) -> Result<(), SageError> {
        self.task_tx
            .send(Job { task, reply })
            .await
            .map_err(|_| SageError::Cancelled)
    }

    /// 提交单个任务并等待其结果
    pub async fn run_one(&self, task: PipelineTask) -> Result<TestExample, SageError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.submit(task, tx).await?;
        match rx.recv().await {
            Some(outcome) => outcome.result,
            None => Err(SageError::Cancelled),
        }
    }

    /// 关闭任务通道并等待所有 worker 退出（队列中剩余任务会先被处理完）
    pub async fn shutdown(self) {
        drop(self.task_tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    generator: Arc<dyn ExampleGenerator>,
    task_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(Job { task, reply }) = job else {
            break;
        };

        let start = Instant::now();
        let result = if cancel.is_cancelled() {
            Err(SageError::Cancelled)
        } else {
            tokio::select! {
                _ = cancel.cancelled() => Err(SageError::Cancelled),
                r = timeout(
                    task_timeout,
                    generator.generate_example(&task.test_name, task.situation.as_deref()),
                ) => r.unwrap_or(Err(SageError::Timeout(task_timeout))),
            }
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => tracing::debug!(worker_id, label = task.label, ?elapsed, "task ok"),
            Err(e) => tracing::warn!(worker_id, label = task.label, ?elapsed, error = %e, "task failed"),
        }

        // 调用方已放弃等待时忽略
        let _ = reply.send(TaskOutcome {
            task,
            result,
            elapsed,
        });
    }
    tracing::debug!(worker_id, "worker exited");
}
