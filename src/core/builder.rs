//! 应用构建器：按配置组装检索、文本模型、结构化生成后端、分类器与工作流
//!
//! 各组件可以用 with_* 预先替换（测试、离线调试），未替换的按配置创建。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::SageError;
use crate::llm::{
    BasetenClient, CohereClient, GenerationClient, HttpTransport, LlmClient, MockLlmClient, OpenAiClient,
    ReqwestTransport, StructuredBackend,
};
use crate::retrieval::{InMemoryIndex, PineconeEmbedder, PineconeIndex, RetrievalClient};
use crate::skills::StatSkills;
use crate::workflow::{ChatClassifier, CohereClassifier, OperationClassifier, StatisticsWorkflow};

pub struct AppBuilder {
    config: AppConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    retrieval: Option<RetrievalClient>,
    text_llm: Option<Arc<dyn LlmClient>>,
    structured: Option<Arc<dyn StructuredBackend>>,
    classifier: Option<Arc<dyn OperationClassifier>>,
}

impl AppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            transport: None,
            retrieval: None,
            text_llm: None,
            structured: None,
            classifier: None,
        }
    }

    /// 替换 HTTP 传输层（所有托管服务共用）
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalClient) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn with_text_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.text_llm = Some(llm);
        self
    }

    pub fn with_structured_backend(mut self, backend: Arc<dyn StructuredBackend>) -> Self {
        self.structured = Some(backend);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OperationClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn transport(&mut self) -> Result<Arc<dyn HttpTransport>, SageError> {
        if let Some(t) = &self.transport {
            return Ok(Arc::clone(t));
        }
        let t: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(self.config.llm.timeouts.request)?);
        self.transport = Some(Arc::clone(&t));
        Ok(t)
    }

    fn cohere(&mut self) -> Result<Arc<CohereClient>, SageError> {
        let transport = self.transport()?;
        let c = &self.config.llm.cohere;
        Ok(Arc::new(CohereClient::new(transport, &c.base_url, &c.model, None, c.temperature)))
    }

    fn build_retrieval(&mut self) -> Result<RetrievalClient, SageError> {
        if let Some(r) = self.retrieval.take() {
            return Ok(r);
        }
        let transport = self.transport()?;
        let r = &self.config.retrieval;
        let embedder = Arc::new(PineconeEmbedder::new(
            Arc::clone(&transport),
            &r.api_base,
            &r.api_version,
            &r.embedding_model,
            None,
        ));
        match r.backend.to_lowercase().as_str() {
            "pinecone" => {
                let index = PineconeIndex::new(
                    transport,
                    &r.api_base,
                    &r.api_version,
                    &r.index_name,
                    r.index_host.as_deref(),
                    None,
                );
                tracing::info!(index = %r.index_name, "using pinecone retrieval");
                Ok(RetrievalClient::new(embedder, Arc::new(index), r.top_k))
            }
            "memory" => {
                tracing::warn!("using empty in-memory index; queries return no context");
                Ok(RetrievalClient::new(embedder, Arc::new(InMemoryIndex::default()), r.top_k))
            }
            other => Err(SageError::Config(format!("unknown retrieval backend '{other}'"))),
        }
    }

    /// 文本模型；provider 为 cohere 时同时返回 Cohere 客户端供分类器复用
    fn build_text_llm(&mut self) -> Result<(Arc<dyn LlmClient>, Option<Arc<CohereClient>>), SageError> {
        if let Some(llm) = self.text_llm.take() {
            return Ok((llm, None));
        }
        match self.config.llm.provider.to_lowercase().as_str() {
            "cohere" => {
                let cohere = self.cohere()?;
                tracing::info!(model = %self.config.llm.cohere.model, "using Cohere LLM");
                let llm: Arc<dyn LlmClient> = cohere.clone();
                Ok((llm, Some(cohere)))
            }
            "openai" => {
                let o = &self.config.llm.openai;
                let model = o.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
                tracing::info!(%model, "using OpenAI-compatible LLM");
                let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(o.base_url.as_deref(), &model, None));
                Ok((llm, None))
            }
            "mock" => {
                tracing::warn!("using Mock LLM");
                let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient);
                Ok((llm, None))
            }
            other => Err(SageError::Config(format!("unknown llm provider '{other}'"))),
        }
    }

    fn build_structured(&mut self) -> Result<Arc<dyn StructuredBackend>, SageError> {
        if let Some(b) = self.structured.take() {
            return Ok(b);
        }
        match self.config.llm.structured_backend.to_lowercase().as_str() {
            "baseten" => {
                let transport = self.transport()?;
                let b = &self.config.llm.baseten;
                let client = BasetenClient::new(
                    transport,
                    b.model_id.as_deref(),
                    b.endpoint.as_deref(),
                    None,
                    b.max_tokens,
                )?;
                Ok(Arc::new(client))
            }
            "cohere" => {
                let backend: Arc<dyn StructuredBackend> = self.cohere()?;
                Ok(backend)
            }
            other => Err(SageError::Config(format!("unknown structured backend '{other}'"))),
        }
    }

    /// 组装完整工作流（启动工作池，需在 tokio 运行时内调用）
    pub fn build(mut self, cancel: CancellationToken) -> Result<StatisticsWorkflow, SageError> {
        let retrieval = self.build_retrieval()?;
        let (text_llm, cohere) = self.build_text_llm()?;
        let structured = self.build_structured()?;

        let classifier: Arc<dyn OperationClassifier> = match (self.classifier.take(), cohere) {
            (Some(c), _) => c,
            (None, Some(cohere)) => Arc::new(CohereClassifier::new(cohere)),
            (None, None) => Arc::new(ChatClassifier::new(Arc::clone(&text_llm))),
        };
        let skills = StatSkills::new(retrieval, text_llm, GenerationClient::new(structured));
        tracing::debug!(
            workers = self.config.pipeline.workers,
            candidates = self.config.pipeline.candidates,
            keep = self.config.pipeline.keep,
            "building workflow"
        );
        Ok(StatisticsWorkflow::new(skills, classifier, &self.config.pipeline, cancel))
    }
}
