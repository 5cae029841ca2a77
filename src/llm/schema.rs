//! 目标类型的 JSON Schema 生成与嵌套深度计算
//!
//! Schema 由 schemars 从 Rust 类型自动生成，随请求发给模型以约束输出格式。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// Cohere JSON 模式允许的最大 Schema 深度
pub const MAX_SCHEMA_DEPTH: usize = 5;

/// 返回类型 T 的 JSON Schema（serde_json::Value 形式）
pub fn schema_value<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or(Value::Null)
}

/// 计算 JSON 对象的嵌套深度：非空对象每层 +1，数组与标量视为叶子
///
/// 根对象记为 1；`{"properties": {"x": {"type": "string"}}}` 深度为 4。
pub fn json_depth(value: &Value) -> usize {
    depth_at(value, 1)
}

fn depth_at(value: &Value, level: usize) -> usize {
    match value {
        Value::Object(map) if !map.is_empty() => map
            .values()
            .map(|v| depth_at(v, level + 1))
            .max()
            .unwrap_or(level),
        _ => level,
    }
}
