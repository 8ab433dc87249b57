//! 规划动作分类
//!
//! 把模型一轮输出中抽取到的 JSON 对象归类为显式的带标签联合（PlannerAction），
//! 循环体内不做任何散落的字段探测。分类保留两条启发式：优先显式 `action` 字段，
//! 缺失时按 `tool` / `final_result` / `done` 字段推断——这是对模型漂移的刻意容忍，
//! 不是待清理的缺陷。

use serde_json::Value;

/// 模型一轮输出归类后的动作
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerAction {
    /// 请求调用目录中的某个工具
    CallTool {
        tool: String,
        args: Value,
        reason: Option<String>,
    },
    /// 声称已可产出最终结果
    FinalResult,
    /// 无法识别（缺失/未知判别字段）；永远不会被默默当作继续动作
    Unknown,
}

/// 把抽取到的 JSON 对象分类为 PlannerAction
pub fn classify(value: &Value) -> PlannerAction {
    let obj = match value.as_object() {
        Some(o) => o,
        None => return PlannerAction::Unknown,
    };

    // 启发式一：显式 action 判别字段
    if let Some(action) = obj.get("action").and_then(Value::as_str) {
        return match action {
            "call_tool" => call_tool_from(obj),
            "final_result" => PlannerAction::FinalResult,
            _ => PlannerAction::Unknown,
        };
    }

    // 启发式二：按字段存在性推断
    if obj.contains_key("tool") {
        return call_tool_from(obj);
    }
    if obj.contains_key("final_result") || obj.contains_key("done") {
        return PlannerAction::FinalResult;
    }

    PlannerAction::Unknown
}

fn call_tool_from(obj: &serde_json::Map<String, Value>) -> PlannerAction {
    let tool = obj
        .get("tool")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let args = obj.get("args").cloned().unwrap_or(Value::Null);
    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_string);
    PlannerAction::CallTool { tool, args, reason }
}
