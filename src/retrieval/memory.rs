//! 内存向量索引（余弦相似度）
//!
//! 与托管索引相同的接口，供测试与离线调试使用；条目超过上限时丢弃最早写入的。

use std::sync::RwLock;

use async_trait::async_trait;

use crate::core::SageError;
use crate::retrieval::{RetrievalMatch, VectorIndex};

/// 一条索引记录：向量 + 元数据
#[derive(Debug, Clone)]
struct Entry {
    vector: Vec<f32>,
    record: RetrievalMatch,
}

pub struct InMemoryIndex {
    entries: RwLock<Vec<Entry>>,
    max_entries: usize,
}

impl InMemoryIndex {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// 写入一个块；record.score 会在查询时被覆盖
    pub fn upsert(&self, vector: Vec<f32>, record: RetrievalMatch) -> Result<(), SageError> {
        if vector.is_empty() {
            return Err(SageError::Config("cannot index an empty vector".into()));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SageError::Config("index lock poisoned".into()))?;
        entries.retain(|e| e.record.id != record.id);
        entries.push(Entry { vector, record });
        if entries.len() > self.max_entries {
            let overflow = entries.len() - self.max_entries;
            entries.drain(0..overflow);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, SageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SageError::Config("index lock poisoned".into()))?;

        let mut scored: Vec<RetrievalMatch> = entries
            .iter()
            .map(|e| {
                let mut m = e.record.clone();
                m.score = cosine_similarity(vector, &e.vector);
                m
            })
            .filter(|m| m.score.is_finite())
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// 余弦相似度
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str) -> RetrievalMatch {
        RetrievalMatch {
            id: id.into(),
            score: 0.0,
            article_title: title.into(),
            section_title: None,
            chunk_content: format!("{title} text"),
            chunk_number: Some(1),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let index = InMemoryIndex::default();
        index.upsert(vec![1.0, 0.0], record("a", "Student's t-test")).unwrap();
        index.upsert(vec![0.0, 1.0], record("b", "Chi-squared test")).unwrap();
        index.upsert(vec![0.7, 0.7], record("c", "Analysis of variance")).unwrap();

        let hits = index.query(&[0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].article_title, "Student's t-test");
        assert_eq!(hits[1].article_title, "Analysis of variance");
    }

    #[tokio::test]
    async fn test_nan_vectors_are_skipped() {
        let index = InMemoryIndex::default();
        index.upsert(vec![1.0, 0.0], record("a", "Student's t-test")).unwrap();
        index.upsert(vec![f32::NAN, 1.0], record("b", "Broken")).unwrap();
        index.upsert(vec![f32::INFINITY, 0.0], record("c", "Overflow")).unwrap();
        index.upsert(vec![0.5, 0.5], record("d", "Analysis of variance")).unwrap();

        let hits = index.query(&[1.0, 0.0], 10).await.unwrap();
        let titles: Vec<_> = hits.iter().map(|h| h.article_title.as_str()).collect();
        assert_eq!(titles, ["Student's t-test", "Analysis of variance"]);
    }

    #[test]
    fn test_upsert_replaces_and_caps() {
        let index = InMemoryIndex::new(2);
        index.upsert(vec![1.0], record("a", "A")).unwrap();
        index.upsert(vec![1.0], record("a", "A2")).unwrap();
        assert_eq!(index.len(), 1);
        index.upsert(vec![1.0], record("b", "B")).unwrap();
        index.upsert(vec![1.0], record("c", "C")).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.upsert(vec![], record("d", "D")).is_err());
    }
}
