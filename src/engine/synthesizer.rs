//! 规范化合成器
//!
//! Finalizing 阶段的第二遍模型调用：全新的两条消息对话（合成 system 指令 +
//! 携带证据的用户消息），刻意不带探索历史，保持提示词小而聚焦。
//! 模型回复无论看起来多正确，都要经过无条件的规范化重写——产物的契约
//! 永远不依赖模型的服从性。合成失败按设计直接致命，不设重试预算。

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::conversation::{Conversation, Message};
use crate::core::{truncate_diag, EngineError};
use crate::engine::prompts;
use crate::evidence::EvidenceAccumulator;
use crate::llm::LlmClient;
use crate::protocol::extract_object;

/// 检出的 .NET 版本三分组
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DotnetVersions {
    pub sdk_versions: Vec<String>,
    pub runtime_versions: Vec<String>,
    pub target_frameworks: Vec<String>,
}

/// 最终产物：顶层键恰好是声明的 schema 键，不多不少
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VersionReport {
    pub repository: String,
    pub dotnet_versions: DotnetVersions,
    /// ISO-8601 UTC 时间戳，由编排方注入，绝不信任模型给的值
    pub scan_timestamp: String,
}

/// 执行合成：一次模型调用 + 无条件规范化
pub async fn synthesize(
    llm: &Arc<dyn LlmClient>,
    repository: &str,
    evidence: &EvidenceAccumulator,
    cancel: &CancellationToken,
) -> Result<VersionReport, EngineError> {
    let schema = serde_json::to_string(&schema_for!(VersionReport))
        .unwrap_or_else(|_| "{}".to_string());

    let mut conversation = Conversation::new(prompts::SYNTHESIS_SYSTEM);
    conversation.push(Message::user(prompts::synthesis_request(
        repository,
        &render_evidence(evidence),
        &schema,
    )));

    let reply = tokio::select! {
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        r = llm.complete(conversation.messages(), None) => r.map_err(EngineError::Llm)?,
    };

    let value = extract_object(&reply).ok_or_else(|| EngineError::Synthesis {
        detail: "no parseable JSON object in synthesis reply".to_string(),
        last_output: truncate_diag(&reply),
    })?;

    Ok(canonicalize(&value, repository))
}

/// 证据条目渲染为提示词中的块
fn render_evidence(evidence: &EvidenceAccumulator) -> String {
    let mut out = String::new();
    for (key, content) in evidence.entries() {
        out.push_str(&format!("--- {key} ---\n{content}\n"));
    }
    if out.is_empty() {
        out.push_str("(no file contents captured; seen paths: ");
        let keys: Vec<&str> = evidence.seen_keys().collect();
        out.push_str(&keys.join(", "));
        out.push_str(")\n");
    }
    out
}

/// 无条件规范化：构造一个只含声明键的全新对象。数组字段只拷贝字符串元素，
/// 去空白、丢空串、按大小写不敏感去重并保留首见顺序；时间戳由服务端生成；
/// repository 取调用方传入值；模型发出的其它任何字段全部丢弃。
pub fn canonicalize(value: &Value, repository: &str) -> VersionReport {
    let nested = value.get("dotnet_versions");
    let field = |name: &str| -> Vec<String> {
        let slot = nested
            .and_then(|n| n.get(name))
            .or_else(|| value.get(name));
        canonical_list(slot)
    };

    VersionReport {
        repository: repository.to_string(),
        dotnet_versions: DotnetVersions {
            sdk_versions: field("sdk_versions"),
            runtime_versions: field("runtime_versions"),
            target_frameworks: field("target_frameworks"),
        },
        scan_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// 数组字段规范化：仅字符串元素、trim、丢空、大小写不敏感去重且顺序稳定
fn canonical_list(slot: Option<&Value>) -> Vec<String> {
    let items = match slot.and_then(Value::as_array) {
        Some(a) => a,
        None => return Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if let Some(s) = item.as_str() {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_lowercase()) {
                out.push(trimmed.to_string());
            }
        }
    }
    out
}
