//! 结构化响应类型
//!
//! 生成层与调用方之间交换的数据契约。字段即 JSON Schema：由 schemars 生成 Schema 发给模型，
//! 再由 serde 反序列化完成校验（缺字段 / 类型不符即失败）。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 统计检验成立所需满足的条件：一句话描述 + 是否满足
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Assumption {
    pub description: String,
    pub pass_status: bool,
}

/// 将某个统计检验应用到具体情境的示例
///
/// 包含情境、检验名、描述、前提条件、检查与执行步骤，以及需要注意的细节（常见陷阱等）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestExample {
    pub situation: String,
    pub test_name: String,
    pub description: String,
    pub assumption_descriptions: Vec<String>,
    pub assumption_pass_statuses: Vec<bool>,
    /// 如何检查前提条件
    pub check_assumptions: String,
    /// 如何执行检验
    pub apply_test: String,
    pub notes: String,
}

impl TestExample {
    /// 将两个平行列表组合为 Assumption（长度不一致时以较短者为准）
    pub fn assumptions(&self) -> Vec<Assumption> {
        zip_assumptions(&self.assumption_descriptions, &self.assumption_pass_statuses)
    }
}

/// 针对某个情境推荐的统计检验及其前提条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestRecommendation {
    pub test_name: String,
    pub assumptions_descriptions: Vec<String>,
    pub assumptions_pass_statuses: Vec<bool>,
}

impl TestRecommendation {
    pub fn assumptions(&self) -> Vec<Assumption> {
        zip_assumptions(&self.assumptions_descriptions, &self.assumptions_pass_statuses)
    }
}

/// 「该用什么检验」的回答：情境 + 推荐检验列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FindTestResponse {
    pub situation: String,
    pub recommended_tests: Vec<TestRecommendation>,
}

fn zip_assumptions(descriptions: &[String], statuses: &[bool]) -> Vec<Assumption> {
    descriptions
        .iter()
        .zip(statuses.iter())
        .map(|(d, s)| Assumption {
            description: d.clone(),
            pass_status: *s,
        })
        .collect()
}
