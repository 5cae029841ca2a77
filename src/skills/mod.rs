//! 技能函数：query_db / explain / find_test / test_example
//!
//! 每个技能把检索结果作为上下文交给生成层，返回经过校验的结构化结果（explain 返回文本）。

pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::SageError;
use crate::llm::{GenerationClient, LlmClient, Message};
use crate::retrieval::{build_context, RetrievalClient, RetrievalMatch};
use crate::types::{FindTestResponse, TestExample};

/// 生成单个示例的能力（示例生成流水线的工作单元依赖它）
#[async_trait]
pub trait ExampleGenerator: Send + Sync {
    async fn generate_example(&self, test_name: &str, situation: Option<&str>) -> Result<TestExample, SageError>;
}

/// 统计技能集合：检索客户端 + 文本模型 + 结构化生成
#[derive(Clone)]
pub struct StatSkills {
    retrieval: RetrievalClient,
    text_llm: Arc<dyn LlmClient>,
    generator: GenerationClient,
}

impl StatSkills {
    pub fn new(retrieval: RetrievalClient, text_llm: Arc<dyn LlmClient>, generator: GenerationClient) -> Self {
        Self {
            retrieval,
            text_llm,
            generator,
        }
    }

    /// 原始检索：返回 Top-K 文本块
    pub async fn query_db(&self, query: &str, top_k: Option<usize>) -> Result<Vec<RetrievalMatch>, SageError> {
        self.retrieval.query(query, top_k).await
    }

    /// 用检索到的内容解释一个概念
    pub async fn explain(&self, query: &str) -> Result<String, SageError> {
        let matches = self.query_db(query, None).await?;
        let context = build_context(&matches);
        let mut system = prompts::EXPLAIN_SYSTEM_PROMPT.to_string();
        if !context.is_empty() {
            system.push_str(&format!(" The context for the query is: {context}"));
        }
        let messages = vec![Message::system(system), Message::user(query)];
        let answer = self.text_llm.complete(&messages).await?;
        tracing::info!(llm = self.text_llm.name(), chunks = matches.len(), "explain done");
        Ok(answer)
    }

    /// 为给定情境推荐统计检验
    pub async fn find_test(&self, situation: &str) -> Result<FindTestResponse, SageError> {
        let matches = self.query_db(&prompts::find_test_query(situation), None).await?;
        let context = build_context(&matches);
        let prompt = format!(
            "{}Here are the tests we found: {}",
            prompts::find_test_prompt(situation),
            context
        );
        let response: FindTestResponse = self.generator.generate(&prompt, Some(&context)).await?;
        tracing::info!(
            backend = self.generator.backend_name(),
            tests = response.recommended_tests.len(),
            "find_test done"
        );
        Ok(response)
    }

    /// 生成一个检验应用示例；情境为空时使用占位情境
    pub async fn test_example(&self, test_name: &str, situation: Option<&str>) -> Result<TestExample, SageError> {
        let context = self.explain(&prompts::example_context_query(test_name)).await?;
        let situation = situation
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(prompts::DEFAULT_SITUATION);
        let prompt = prompts::example_test_prompt(test_name, situation);
        self.generator.generate(&prompt, Some(&context)).await
    }
}

#[async_trait]
impl ExampleGenerator for StatSkills {
    async fn generate_example(&self, test_name: &str, situation: Option<&str>) -> Result<TestExample, SageError> {
        self.test_example(test_name, situation).await
    }
}
