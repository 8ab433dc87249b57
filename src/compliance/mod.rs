//! PR 合规检查：带标签数组的重试流水线
//!
//! 任务可分解为相互独立的顺序阶段（归一化 -> 标题规则 -> 描述规则），
//! 每阶段要求模型输出一个 ```json 围栏包裹的 JSON 数组，独立重试并配升级
//! 纠正提示；耗尽尝试数后该阶段“开放失败”为 空数组 而非中止整次运行——
//! 后续阶段与最终聚合必须容忍空结果。与主规划循环（封闭失败）刻意相反。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::conversation::{Conversation, Message};
use crate::core::EngineError;
use crate::llm::LlmClient;
use crate::protocol::extract_array;

/// 单条合规结论（线格式为 PascalCase；按契约只上报失败条目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    #[serde(rename = "PullRequestNumber")]
    pub pull_request_number: i64,
    #[serde(rename = "Check")]
    pub check: String,
    #[serde(rename = "Passed")]
    pub passed: bool,
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// 阶段定义：名字 + 对模型的要求
struct Phase {
    name: &'static str,
    instructions: &'static str,
    /// 归一化阶段产出上下文，检查阶段产出结论
    emits_findings: bool,
}

const PHASES: [Phase; 3] = [
    Phase {
        name: "normalize",
        instructions: "Normalize the pull requests below into a JSON array of objects \
                       {\"PullRequestNumber\": <int>, \"Title\": <string>, \"Description\": <string>}. \
                       Carry every pull request over; do not drop or invent entries.",
        emits_findings: false,
    },
    Phase {
        name: "title_check",
        instructions: "Check each pull request title: it must be non-empty and start with a \
                       bracketed change type such as [FEATURE], [FIX] or [CHORE]. \
                       Output a JSON array of {\"PullRequestNumber\": <int>, \"Check\": \"title_check\", \
                       \"Passed\": <bool>, \"Reason\": <string>} containing ONLY the failing pull requests.",
        emits_findings: true,
    },
    Phase {
        name: "description_check",
        instructions: "Check each pull request description: it must be non-empty and state what \
                       changed and why. Output a JSON array of {\"PullRequestNumber\": <int>, \
                       \"Check\": \"description_check\", \"Passed\": <bool>, \"Reason\": <string>} \
                       containing ONLY the failing pull requests.",
        emits_findings: true,
    },
];

const COMPLIANCE_SYSTEM: &str = "\
You are a pull request compliance checker. Every reply must be a JSON array \
wrapped in a ```json fenced block. No commentary outside the fence.";

/// 升级纠正提示：随失败次数加码
fn escalating_corrective(attempt: usize) -> String {
    match attempt {
        1 => "Your previous output was invalid: no JSON array found. \
              Reply with a JSON array inside a ```json fenced block."
            .to_string(),
        2 => "Your previous output was invalid AGAIN. You must output ONLY a ```json fenced \
              block containing a JSON array ([...]). An object ({}) is not acceptable."
            .to_string(),
        n => format!(
            "Attempt {} was invalid. FINAL WARNING: output exactly one ```json fenced block \
             containing a JSON array and absolutely nothing else.",
            n
        ),
    }
}

/// 合规流水线：顺序跑各阶段，聚合失败条目
pub struct CompliancePipeline {
    llm: Arc<dyn LlmClient>,
    max_attempts: usize,
}

impl CompliancePipeline {
    pub fn new(llm: Arc<dyn LlmClient>, max_attempts: usize) -> Self {
        Self { llm, max_attempts }
    }

    /// 对一组 PR 执行全部阶段。阶段间只通过（可能为空的）前序结果文本衔接，
    /// 任何阶段的失败都不会阻断后续阶段。
    pub async fn run(
        &self,
        pull_requests: &Value,
        cancel: CancellationToken,
    ) -> Result<Vec<ComplianceFinding>, EngineError> {
        let mut context = pull_requests.to_string();
        let mut findings = Vec::new();

        for phase in &PHASES {
            let result = self.run_phase(phase, &context, &cancel).await?;
            tracing::info!(
                phase = phase.name,
                entries = result.as_array().map(Vec::len).unwrap_or(0),
                "compliance phase finished"
            );

            if phase.emits_findings {
                findings.extend(parse_findings(&result));
            } else {
                // 归一化结果成为后续阶段的输入上下文
                context = result.to_string();
            }
        }

        Ok(findings)
    }

    /// 单阶段：独立对话，有界重试，耗尽后开放失败为空数组
    async fn run_phase(
        &self,
        phase: &Phase,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, EngineError> {
        let mut conversation = Conversation::new(COMPLIANCE_SYSTEM);
        conversation.push(Message::user(format!(
            "{}\n\nPull requests:\n{}",
            phase.instructions, context
        )));

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let reply = tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                r = self.llm.complete(conversation.messages(), None) => r,
            };
            let reply = match reply {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(phase = phase.name, attempt, error = %e, "model call failed");
                    continue;
                }
            };
            conversation.push(Message::assistant(reply.clone()));

            if let Some(array) = extract_array(&reply) {
                return Ok(array);
            }

            tracing::debug!(phase = phase.name, attempt, "invalid phase output");
            conversation.push(Message::user(escalating_corrective(attempt)));
        }

        tracing::warn!(
            phase = phase.name,
            attempts = self.max_attempts,
            "phase attempts exhausted, failing open to empty array"
        );
        Ok(Value::Array(Vec::new()))
    }
}

/// 把阶段数组解析为结论条目；解析不动的条目丢弃，只保留失败项
fn parse_findings(array: &Value) -> Vec<ComplianceFinding> {
    array
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|item| serde_json::from_value::<ComplianceFinding>(item.clone()).ok())
        .filter(|f| !f.passed)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use serde_json::json;

    fn prs() -> Value {
        json!([
            {"number": 11, "title": "[FIX] null deref", "description": "Fixes a crash"},
            {"number": 12, "title": "wip", "description": ""}
        ])
    }

    fn fenced(v: &Value) -> String {
        format!("```json\n{}\n```", v)
    }

    #[tokio::test]
    async fn test_pipeline_aggregates_only_failures() {
        let normalize = fenced(&json!([
            {"PullRequestNumber": 11, "Title": "[FIX] null deref", "Description": "Fixes a crash"},
            {"PullRequestNumber": 12, "Title": "wip", "Description": ""}
        ]));
        let title = fenced(&json!([
            {"PullRequestNumber": 12, "Check": "title_check", "Passed": false, "Reason": "no bracketed type"}
        ]));
        let description = fenced(&json!([
            {"PullRequestNumber": 12, "Check": "description_check", "Passed": false, "Reason": "empty"},
            {"PullRequestNumber": 11, "Check": "description_check", "Passed": true, "Reason": "fine"}
        ]));
        let llm = Arc::new(ScriptedLlm::new(vec![normalize, title, description]));
        let pipeline = CompliancePipeline::new(llm, 3);

        let findings = pipeline
            .run(&prs(), CancellationToken::new())
            .await
            .unwrap();
        // Passed=true 的条目被过滤，只留失败
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| !f.passed));
        assert!(findings.iter().all(|f| f.pull_request_number == 12));
    }

    #[tokio::test]
    async fn test_phase_exhaustion_fails_open_and_run_continues() {
        // normalize 阶段三次全败 -> []；后续阶段照常进行
        let title = fenced(&json!([
            {"PullRequestNumber": 12, "Check": "title_check", "Passed": false, "Reason": "bad"}
        ]));
        let empty = fenced(&json!([]));
        let llm = Arc::new(ScriptedLlm::new(vec![
            "not an array".to_string(),
            "{}".to_string(),
            "still wrong".to_string(),
            title,
            empty,
        ]));
        let pipeline = CompliancePipeline::new(llm.clone(), 3);

        let findings = pipeline
            .run(&prs(), CancellationToken::new())
            .await
            .unwrap();
        // 3 次 normalize 失败 + title + description = 5 次模型调用
        assert_eq!(llm.calls(), 5);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "title_check");
    }

    #[tokio::test]
    async fn test_empty_object_never_accepted_as_array() {
        // 每阶段都回 "{}"：全部耗尽并开放失败，结论为空
        let llm = Arc::new(ScriptedLlm::new(vec!["{}"]));
        let pipeline = CompliancePipeline::new(llm.clone(), 3);
        let findings = pipeline
            .run(&prs(), CancellationToken::new())
            .await
            .unwrap();
        assert!(findings.is_empty());
        // 3 个阶段各 3 次尝试
        assert_eq!(llm.calls(), 9);
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let llm = Arc::new(ScriptedLlm::new(vec!["[]"]));
        let pipeline = CompliancePipeline::new(llm, 3);
        let err = pipeline.run(&prs(), cancel).await.unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }

    #[test]
    fn test_findings_wire_format_pascal_case() {
        let f = ComplianceFinding {
            pull_request_number: 7,
            check: "title_check".to_string(),
            passed: false,
            reason: "missing type".to_string(),
        };
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["PullRequestNumber"], 7);
        assert_eq!(v["Check"], "title_check");
        assert_eq!(v["Passed"], false);
        assert_eq!(v["Reason"], "missing type");
    }
}
