//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HSAGE__*` 覆盖（双下划线表示嵌套，如 `HSAGE__LLM__PROVIDER=openai`）。
//! API Key 不进配置文件，由各客户端从环境变量读取（PINECONE_API_KEY / COHERE_API_KEY / BASETEN_API_KEY / OPENAI_API_KEY）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// [retrieval] 段：向量索引与嵌入模型
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    /// 后端：pinecone / memory（memory 仅用于离线调试，索引为空）
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// 直接指定索引 host 时跳过 describe_index 查询
    pub index_host: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_pinecone_api_base")]
    pub api_base: String,
    #[serde(default = "default_pinecone_api_version")]
    pub api_version: String,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            index_name: default_index_name(),
            index_host: None,
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
            api_base: default_pinecone_api_base(),
            api_version: default_pinecone_api_version(),
        }
    }
}

fn default_retrieval_backend() -> String {
    "pinecone".to_string()
}

fn default_index_name() -> String {
    "statwiki".to_string()
}

fn default_embedding_model() -> String {
    "multilingual-e5-large".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_pinecone_api_base() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_pinecone_api_version() -> String {
    "2024-10".to_string()
}

/// [llm] 段：文本模型与结构化生成后端的选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 文本模型（explain / 路由分类）：cohere / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 结构化生成（find_test / test_example）：baseten / cohere
    #[serde(default = "default_structured_backend")]
    pub structured_backend: String,
    #[serde(default)]
    pub cohere: LlmCohereSection,
    #[serde(default)]
    pub baseten: LlmBasetenSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            structured_backend: default_structured_backend(),
            cohere: LlmCohereSection::default(),
            baseten: LlmBasetenSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "cohere".to_string()
}

fn default_structured_backend() -> String {
    "baseten".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmCohereSection {
    #[serde(default = "default_cohere_model")]
    pub model: String,
    #[serde(default = "default_cohere_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmCohereSection {
    fn default() -> Self {
        Self {
            model: default_cohere_model(),
            base_url: default_cohere_base_url(),
            temperature: default_temperature(),
        }
    }
}

fn default_cohere_model() -> String {
    "command-r-plus".to_string()
}

fn default_cohere_base_url() -> String {
    "https://api.cohere.ai/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmBasetenSection {
    pub model_id: Option<String>,
    /// 覆盖默认的 https://model-{id}.api.baseten.co/production/predict
    pub endpoint: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmBasetenSection {
    fn default() -> Self {
        Self {
            model_id: None,
            endpoint: None,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> u32 {
    8192
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [pipeline] 段：示例生成的冗余系数、工作池大小与超时
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// 每批并发生成的候选数
    #[serde(default = "default_candidates")]
    pub candidates: usize,
    /// 每批保留的示例数（按完成顺序取前 N 个）
    #[serde(default = "default_keep")]
    pub keep: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 单个候选任务超时（秒）
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// ask 整体超时（秒）
    #[serde(default = "default_workflow_timeout_secs")]
    pub workflow_timeout_secs: u64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            keep: default_keep(),
            workers: default_workers(),
            task_timeout_secs: default_task_timeout_secs(),
            workflow_timeout_secs: default_workflow_timeout_secs(),
        }
    }
}

impl PipelineSection {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_secs)
    }
}

fn default_candidates() -> usize {
    5
}

fn default_keep() -> usize {
    3
}

fn default_workers() -> usize {
    10
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_workflow_timeout_secs() -> u64 {
    240
}

/// [logging] 段：默认日志级别，RUST_LOG 优先
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 输出到 stderr 时是否带 ANSI 颜色
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_ansi(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_ansi() -> bool {
    true
}

/// 从 config 目录加载配置，环境变量 HSAGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HSAGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HSAGE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
