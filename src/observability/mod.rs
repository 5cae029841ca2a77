//! 可观测性：tracing 订阅器初始化
//!
//! 日志写到 stderr，stdout 只留给结果表格 / JSON。RUST_LOG 优先于配置中的级别，-v 强制 debug。
//! init 返回的 TelemetryGuard 由 main 持有，drop 时记录会话结束与耗时。

use std::time::Instant;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSection;

/// 会话守卫：drop 时输出结束日志
#[must_use = "dropping the guard ends the telemetry session"]
pub struct TelemetryGuard {
    started: Instant,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(elapsed_ms = self.started.elapsed().as_millis() as u64, "session finished");
    }
}

/// 计算过滤指令：verbose > RUST_LOG > 配置
fn filter_for(settings: &LoggingSection, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("hsage=debug,info");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("warn"))
    })
}

/// 安装全局订阅器；重复调用（如测试中）不报错
pub fn init(settings: &LoggingSection, verbose: bool) -> TelemetryGuard {
    let result = tracing_subscriber::registry()
        .with(filter_for(settings, verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(settings.ansi)
                .with_target(false)
                .compact(),
        )
        .try_init();
    if result.is_ok() {
        tracing::debug!(level = %settings.level, verbose, "telemetry initialized");
    }
    TelemetryGuard {
        started: Instant::now(),
    }
}
