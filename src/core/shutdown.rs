//! 优雅关闭
//!
//! Ctrl+C / SIGTERM 触发取消令牌；工作池中的 worker 监听该令牌，
//! 进行中的任务以 Cancelled 结束，示例批次仍能完成汇总。
//! 第一次收到的信号决定进程退出码。

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl ShutdownReason {
    /// 128 + 信号编号
    pub fn exit_code(self) -> u8 {
        match self {
            ShutdownReason::Interrupt => 130,
            ShutdownReason::Terminate => 143,
        }
    }
}

/// 取消令牌 + 首个关闭原因
#[derive(Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取消令牌（交给工作池）
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 记录原因并取消；重复调用只保留第一次的原因
    pub fn trigger(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::warn!(?reason, "cancelling in-flight tasks");
        }
        self.token.cancel();
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.trigger(ShutdownReason::Interrupt);
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            manager.trigger(ShutdownReason::Terminate);
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "SIGTERM handler unavailable"),
                }
            });
        }
    }
}
