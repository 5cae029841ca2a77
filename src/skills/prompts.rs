//! Prompt 模板

/// explain 的 system prompt（后接检索上下文）
pub const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are a helpful assistant for answering questions about statistics.";

/// 情境缺省时的占位描述
pub const DEFAULT_SITUATION: &str = "A hypothetical scenario where we need to apply the test.";

pub fn example_test_prompt(test_name: &str, situation: &str) -> String {
    format!(
        "Create an example applying the {test_name} to the following situation:\n\
         Situation: {situation}\n\
         Return the example in JSON format, respecting the TestExample structure.\n"
    )
}

pub fn find_test_prompt(situation: &str) -> String {
    format!(
        "Given the following situation, find a set of appropriate statistical tests to apply:\n\
         Situation: {situation}\n\
         Return the assumptions for each test, whether they pass or not, \
         and recommend a test/procedure in JSON format.\n"
    )
}

/// find_test 的检索查询
pub fn find_test_query(situation: &str) -> String {
    format!("Find statistical tests related to {situation}. They should be able to answer the question.")
}

/// test_example 的上下文查询
pub fn example_context_query(test_name: &str) -> String {
    format!("Provide context for {test_name}")
}
