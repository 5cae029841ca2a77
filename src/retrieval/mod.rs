//! 检索层：查询文本 → 嵌入 → 向量索引 Top-K → 带元数据的文本块
//!
//! 嵌入与近邻查询分别抽象为 Embedder / VectorIndex，托管实现为 Pinecone，
//! 内存实现（余弦相似度）用于测试与离线调试。

pub mod memory;
pub mod pinecone;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::SageError;

pub use memory::InMemoryIndex;
pub use pinecone::{PineconeEmbedder, PineconeIndex};

/// 一条检索结果：分数 + 文章/章节标题 + 文本块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub id: String,
    pub score: f32,
    pub article_title: String,
    pub section_title: Option<String>,
    pub chunk_content: String,
    pub chunk_number: Option<u32>,
}

/// 文本嵌入
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, SageError>;
}

/// 向量近邻查询
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, SageError>;
}

/// 检索客户端：一次嵌入 + 一次索引查询，结果按分数从高到低排列
#[derive(Clone)]
pub struct RetrievalClient {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    default_top_k: usize,
}

impl RetrievalClient {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, default_top_k: usize) -> Self {
        Self {
            embedder,
            index,
            default_top_k: default_top_k.max(1),
        }
    }

    pub async fn query(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalMatch>, SageError> {
        let k = top_k.unwrap_or(self.default_top_k).max(1);
        let vector = self.embedder.embed_query(query).await?;
        if vector.is_empty() {
            return Err(SageError::Decode("embedding service returned an empty vector".into()));
        }
        let mut matches = self.index.query(&vector, k).await?;
        let returned = matches.len();
        matches.retain(|m| m.score.is_finite());
        if matches.len() < returned {
            tracing::warn!(dropped = returned - matches.len(), "index returned non-finite scores");
        }
        // 稳定排序：同分保持索引返回的顺序
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        tracing::debug!(query = %query, k, hits = matches.len(), "retrieval");
        Ok(matches)
    }
}

/// 把检索结果拼成上下文字符串（块之间以空格分隔）
pub fn build_context(matches: &[RetrievalMatch]) -> String {
    matches
        .iter()
        .map(|m| m.chunk_content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
