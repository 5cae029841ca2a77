//! Pinecone 托管嵌入与索引查询
//!
//! - 嵌入：POST {api_base}/embed（input_type=query，truncate=END）
//! - 索引 host：GET {api_base}/indexes/{name}，首次查询时解析并缓存；也可在配置中直接给出
//! - 查询：POST https://{host}/query（topK，includeMetadata）
//!
//! 元数据键沿用建索引时的列名：Article Title / Section Title / Chunk Content / Chunk Number。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::core::SageError;
use crate::llm::transport::{Header, HttpTransport};
use crate::retrieval::{Embedder, RetrievalMatch, VectorIndex};

/// Pinecone 请求公共部分：传输、API 地址、Key、版本号
#[derive(Clone)]
struct PineconeApi {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    api_key: String,
    api_version: String,
}

impl PineconeApi {
    fn headers(&self) -> Vec<Header> {
        vec![
            ("Api-Key".to_string(), self.api_key.clone()),
            ("X-Pinecone-API-Version".to_string(), self.api_version.clone()),
        ]
    }
}

fn resolve_key(api_key: Option<&str>) -> String {
    api_key
        .map(String::from)
        .or_else(|| std::env::var("PINECONE_API_KEY").ok())
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedValues>,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

/// Pinecone Inference 嵌入
pub struct PineconeEmbedder {
    api: PineconeApi,
    model: String,
}

impl PineconeEmbedder {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_base: &str,
        api_version: &str,
        model: &str,
        api_key: Option<&str>,
    ) -> Self {
        Self {
            api: PineconeApi {
                transport,
                api_base: api_base.trim_end_matches('/').to_string(),
                api_key: resolve_key(api_key),
                api_version: api_version.to_string(),
            },
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Embedder for PineconeEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SageError> {
        let body = json!({
            "model": self.model,
            "parameters": { "input_type": "query", "truncate": "END" },
            "inputs": [{ "text": text }],
        });
        let url = format!("{}/embed", self.api.api_base);
        let raw = self.api.transport.post_json(&url, &self.api.headers(), &body).await?;
        let resp: EmbedResponse =
            serde_json::from_str(&raw).map_err(|e| SageError::Decode(format!("pinecone embed response: {e}")))?;
        resp.data
            .into_iter()
            .next()
            .map(|d| d.values)
            .ok_or_else(|| SageError::Decode("pinecone embed response has no data".into()))
    }
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Value>,
}

impl RawMatch {
    fn into_match(self) -> RetrievalMatch {
        let meta = self.metadata.unwrap_or(Value::Null);
        let text = |key: &str| {
            meta.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        // Chunk Number 写入时可能是数字，也可能被转成浮点或字符串
        let chunk_number = meta.get("Chunk Number").and_then(|v| match v {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        RetrievalMatch {
            id: self.id,
            score: self.score,
            article_title: text("Article Title").unwrap_or_default(),
            section_title: text("Section Title"),
            chunk_content: text("Chunk Content").unwrap_or_default(),
            chunk_number: chunk_number.and_then(|n| u32::try_from(n).ok()),
        }
    }
}

/// Pinecone 索引（按名称解析 host）
pub struct PineconeIndex {
    api: PineconeApi,
    index_name: String,
    host: OnceCell<String>,
}

impl PineconeIndex {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_base: &str,
        api_version: &str,
        index_name: &str,
        index_host: Option<&str>,
        api_key: Option<&str>,
    ) -> Self {
        let host = OnceCell::new();
        if let Some(h) = index_host {
            let _ = host.set(normalize_host(h));
        }
        Self {
            api: PineconeApi {
                transport,
                api_base: api_base.trim_end_matches('/').to_string(),
                api_key: resolve_key(api_key),
                api_version: api_version.to_string(),
            },
            index_name: index_name.to_string(),
            host,
        }
    }

    async fn host(&self) -> Result<&str, SageError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let url = format!("{}/indexes/{}", self.api.api_base, self.index_name);
                let raw = self.api.transport.get(&url, &self.api.headers()).await?;
                let desc: DescribeIndexResponse = serde_json::from_str(&raw)
                    .map_err(|e| SageError::Decode(format!("pinecone describe_index response: {e}")))?;
                tracing::info!(index = %self.index_name, host = %desc.host, "resolved pinecone index host");
                Ok::<_, SageError>(normalize_host(&desc.host))
            })
            .await?;
        Ok(host.as_str())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, SageError> {
        let url = format!("{}/query", self.host().await?);
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        let raw = self.api.transport.post_json(&url, &self.api.headers(), &body).await?;
        let resp: QueryResponse =
            serde_json::from_str(&raw).map_err(|e| SageError::Decode(format!("pinecone query response: {e}")))?;
        Ok(resp.matches.into_iter().map(RawMatch::into_match).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::transport::stub::StubTransport;
    use crate::retrieval::RetrievalClient;

    const QUERY_BODY: &str = r#"{
        "matches": [
            {"id": "12", "score": 0.81, "metadata": {
                "Article Title": "Student's t-test", "Section Title": "Unpaired and paired two-sample t-tests",
                "Chunk Content": "Two-sample t-tests for a difference in means ...", "Chunk Number": 3.0}},
            {"id": "40", "score": 0.77, "metadata": {
                "Article Title": "Welch's t-test", "Section Title": "",
                "Chunk Content": "Welch's t-test is a two-sample location test ...", "Chunk Number": 1}}
        ],
        "namespace": ""
    }"#;

    #[tokio::test]
    async fn test_embed_request_shape() {
        let transport = Arc::new(StubTransport::new().respond(r#"{"data": [{"values": [0.1, 0.2]}]}"#));
        let embedder = PineconeEmbedder::new(
            transport.clone(),
            "https://api.pinecone.test/",
            "2024-10",
            "multilingual-e5-large",
            Some("pk"),
        );
        let v = embedder.embed_query("two-sample comparison").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2]);

        let req = transport.last_request().unwrap();
        assert_eq!(req.url, "https://api.pinecone.test/embed");
        let body = req.body.unwrap();
        assert_eq!(body["parameters"]["input_type"], "query");
        assert_eq!(body["inputs"][0]["text"], "two-sample comparison");
        assert!(req.headers.iter().any(|(k, v)| k == "Api-Key" && v == "pk"));
    }

    #[tokio::test]
    async fn test_host_resolved_once_and_metadata_parsed() {
        let transport = Arc::new(
            StubTransport::new()
                .respond(r#"{"name": "statwiki", "host": "statwiki-abc.svc.pinecone.io"}"#)
                .respond(QUERY_BODY)
                .respond(QUERY_BODY),
        );
        let index = PineconeIndex::new(transport.clone(), "https://api.pinecone.test", "2024-10", "statwiki", None, Some("pk"));

        let hits = index.query(&[0.1, 0.2], 5).await.unwrap();
        let _ = index.query(&[0.1, 0.2], 5).await.unwrap();
        assert_eq!(transport.call_count(), 3);

        let requests = transport.requests.lock().unwrap().clone();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].url, "https://api.pinecone.test/indexes/statwiki");
        assert_eq!(requests[1].url, "https://statwiki-abc.svc.pinecone.io/query");
        assert_eq!(requests[1].body.as_ref().unwrap()["topK"], 5);

        assert_eq!(hits[0].article_title, "Student's t-test");
        assert_eq!(hits[0].chunk_number, Some(3));
        assert_eq!(hits[1].section_title, None);
    }

    #[tokio::test]
    async fn test_configured_host_skips_describe() {
        let transport = Arc::new(StubTransport::new().respond(r#"{"matches": []}"#));
        let index = PineconeIndex::new(
            transport.clone(),
            "https://api.pinecone.test",
            "2024-10",
            "statwiki",
            Some("statwiki-abc.svc.pinecone.io"),
            None,
        );
        assert!(index.query(&[1.0], 3).await.unwrap().is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_chunk_number_is_dropped() {
        let body = r#"{"matches": [
            {"id": "1", "score": 0.5, "metadata": {"Article Title": "A", "Chunk Number": 8589934592}},
            {"id": "2", "score": 0.4, "metadata": {"Article Title": "B", "Chunk Number": "7"}}
        ]}"#;
        let transport = Arc::new(StubTransport::new().respond(body));
        let index = PineconeIndex::new(transport, "https://x", "2024-10", "i", Some("h"), None);
        let hits = index.query(&[1.0], 3).await.unwrap();
        assert_eq!(hits[0].chunk_number, None);
        assert_eq!(hits[1].chunk_number, Some(7));
    }

    #[tokio::test]
    async fn test_malformed_query_response_is_decode_error() {
        let transport = Arc::new(StubTransport::new().respond("<html>gateway</html>"));
        let index = PineconeIndex::new(transport, "https://x", "2024-10", "i", Some("h"), None);
        let err = index.query(&[1.0], 3).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_end_to_end_through_retrieval_client() {
        let transport = Arc::new(
            StubTransport::new()
                .respond(r#"{"data": [{"values": [0.3, 0.4]}]}"#)
                .respond(QUERY_BODY),
        );
        let client = RetrievalClient::new(
            Arc::new(PineconeEmbedder::new(transport.clone(), "https://api", "2024-10", "m", None)),
            Arc::new(PineconeIndex::new(transport, "https://api", "2024-10", "statwiki", Some("h.io"), None)),
            5,
        );
        let hits = client.query("two-sample comparison", None).await.unwrap();
        assert_eq!(hits[0].article_title, "Student's t-test");
        assert!(hits[0].score >= hits[1].score);
    }
}
