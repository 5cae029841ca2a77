//! 结构化生成客户端
//!
//! 流程：由目标类型生成 Schema → 交给 StructuredBackend 生成 → 解析为 JSON（失败即 Decode）
//! → 反序列化为目标类型（失败即 SchemaValidation）。不做自动重试，错误一律向上传播。

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::SageError;
use crate::llm::schema::schema_value;
use crate::llm::transport::preview;
use crate::llm::StructuredBackend;

/// 结构化生成客户端：持有一个后端，对外提供按类型生成的接口
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn StructuredBackend>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn StructuredBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 生成一个符合 T 的 Schema 的对象
    pub async fn generate<T>(&self, prompt: &str, context: Option<&str>) -> Result<T, SageError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = schema_value::<T>();
        let start = Instant::now();
        let result = self.backend.generate_json(prompt, context, &schema).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_transport() => "transport_error",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "llm_audit",
            "backend": self.backend.name(),
            "schema": schema.get("title").and_then(Value::as_str).unwrap_or("?"),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "generation");

        let raw = result?;
        validate::<T>(&raw)
    }
}

/// 先按 JSON 解析（Decode），再按目标类型校验（SchemaValidation）
pub fn validate<T: DeserializeOwned>(raw: &str) -> Result<T, SageError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
        tracing::warn!(raw = %preview(raw, 200), "response is not valid JSON");
        SageError::Decode(e.to_string())
    })?;
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "response does not match the expected structure");
        SageError::SchemaValidation(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::ErrorKind;
    use crate::types::TestExample;

    struct FixedBackend(Result<&'static str, fn() -> SageError>);

    #[async_trait]
    impl StructuredBackend for FixedBackend {
        async fn generate_json(&self, _: &str, _: Option<&str>, _: &Value) -> Result<String, SageError> {
            match &self.0 {
                Ok(s) => Ok(s.to_string()),
                Err(f) => Err(f()),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    const EXAMPLE: &str = r#"{
        "situation": "Compare two classes' exam scores",
        "test_name": "Student's t-test",
        "description": "Compares two means",
        "assumption_descriptions": ["Normality", "Equal variances"],
        "assumption_pass_statuses": [true, false],
        "check_assumptions": "Shapiro-Wilk, Levene",
        "apply_test": "Compute t and compare to critical value",
        "notes": "Use Welch's test when variances differ"
    }"#;

    #[tokio::test]
    async fn test_generate_ok() {
        let client = GenerationClient::new(Arc::new(FixedBackend(Ok(EXAMPLE))));
        let ex: TestExample = client.generate("p", None).await.unwrap();
        assert_eq!(ex.test_name, "Student's t-test");
        assert_eq!(ex.assumptions().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_field_is_schema_error_not_transport() {
        let client = GenerationClient::new(Arc::new(FixedBackend(Ok(
            r#"{"situation": "s", "test_name": "t"}"#,
        ))));
        let err = client.generate::<TestExample>("p", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_decode_error() {
        let client = GenerationClient::new(Arc::new(FixedBackend(Ok("Sure! Here is your example:"))));
        let err = client.generate::<TestExample>("p", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let client = GenerationClient::new(Arc::new(FixedBackend(Err(|| {
            SageError::HttpStatus { status: 503, body: "unavailable".into() }
        }))));
        let err = client.generate::<TestExample>("p", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
