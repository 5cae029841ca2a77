//! LLM 层：传输、文本客户端（Cohere / OpenAI 兼容 / Mock）、结构化生成（Baseten / Cohere）

pub mod baseten;
pub mod cohere;
pub mod generation;
pub mod mock;
pub mod openai;
pub mod schema;
pub mod traits;
pub mod transport;

pub use baseten::BasetenClient;
pub use cohere::{CohereClient, ToolCall};
pub use generation::GenerationClient;
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{LlmClient, Message, Role, StructuredBackend};
pub use transport::{HttpTransport, ReqwestTransport};
