//! HTTP 传输层
//!
//! 所有托管服务（Pinecone / Cohere / Baseten）都通过 HttpTransport 发请求：
//! 生产环境用 reqwest，测试用预置响应 + 调用计数的桩实现。非 2xx 统一转为 `SageError::HttpStatus`。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::core::SageError;

/// 单个请求头
pub type Header = (String, String);

/// HTTP 传输 trait：返回原始响应体文本，解析交给调用方（以区分传输错误与解码错误）
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, headers: &[Header], body: &Value) -> Result<String, SageError>;

    async fn get(&self, url: &str, headers: &[Header]) -> Result<String, SageError>;
}

/// 基于 reqwest 的传输实现（连接池在多个任务间共享）
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> Result<Self, SageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("hsage/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn finish(&self, url: &str, request: reqwest::RequestBuilder) -> Result<String, SageError> {
        let start = Instant::now();
        let resp = request.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        tracing::debug!(
            url = %redact_url(url),
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            bytes = text.len(),
            "http"
        );
        if !status.is_success() {
            return Err(SageError::HttpStatus {
                status: status.as_u16(),
                body: preview(&text, 300),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, headers: &[Header], body: &Value) -> Result<String, SageError> {
        let mut req = self.client.post(url).json(body);
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }
        self.finish(url, req).await
    }

    async fn get(&self, url: &str, headers: &[Header]) -> Result<String, SageError> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }
        self.finish(url, req).await
    }
}

/// 日志里只保留 scheme + host + path，去掉查询串
fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// 截取前 max 个字符，超出部分以 ... 标记
pub(crate) fn preview(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}
