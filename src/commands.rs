//! 命令入口：每个 CLI 子命令对应一个库函数，返回结构化结果；format_outcome 负责输出表格或 JSON

use crate::core::SageError;
use crate::retrieval::RetrievalMatch;
use crate::types::{FindTestResponse, TestExample};
use crate::ui;
use crate::workflow::{ExampleBatch, StatisticsWorkflow, WorkflowOutcome};

/// 检索知识库
pub async fn query(wf: &StatisticsWorkflow, q: &str, top_k: Option<usize>) -> Result<Vec<RetrievalMatch>, SageError> {
    wf.skills().query_db(q, top_k).await
}

/// 生成单个示例（经工作池）
pub async fn make_example(
    wf: &StatisticsWorkflow,
    test_name: &str,
    situation: Option<&str>,
) -> Result<TestExample, SageError> {
    wf.single_example(test_name, situation).await
}

/// 生成一批示例（派发多个候选，保留最先完成的几个）
pub async fn make_examples(
    wf: &StatisticsWorkflow,
    test_name: &str,
    situation: Option<&str>,
) -> Result<ExampleBatch, SageError> {
    wf.pipeline().generate(test_name, situation).await
}

/// 为情境推荐检验
pub async fn find_best_test(wf: &StatisticsWorkflow, prompt: &str) -> Result<FindTestResponse, SageError> {
    wf.skills().find_test(prompt).await
}

/// 解释概念
pub async fn explain_this(wf: &StatisticsWorkflow, query: &str) -> Result<String, SageError> {
    wf.skills().explain(query).await
}

/// 自由提问：先分类再执行
pub async fn ask(wf: &StatisticsWorkflow, query: &str) -> Result<WorkflowOutcome, SageError> {
    wf.run(query).await
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, SageError> {
    serde_json::to_string_pretty(value).map_err(|e| SageError::Decode(format!("serialize output: {e}")))
}

/// 输出文本：json 为 true 时输出结构化值本身，否则输出表格
pub fn format_outcome(outcome: &WorkflowOutcome, json: bool, width: u16, ansi: bool) -> Result<String, SageError> {
    if !json {
        return Ok(ui::render_views(&ui::outcome_view(outcome, width), ansi));
    }
    let mut out = match outcome {
        WorkflowOutcome::Matches(m) => to_json(m)?,
        WorkflowOutcome::Tests(t) => to_json(t)?,
        WorkflowOutcome::Example(e) => to_json(e)?,
        WorkflowOutcome::Explanation(text) => to_json(&serde_json::json!({ "explanation": text }))?,
        WorkflowOutcome::Examples(batch) => to_json(batch)?,
    };
    out.push('\n');
    Ok(out)
}
