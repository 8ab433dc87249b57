//! 规划循环：协议约束的编排状态机
//!
//! Exploring -> Finalizing -> Terminated(Success|Failure)。每轮把完整对话
//! （含工具目录）重放给模型，抽取并分类其回复，再分发给网关或证据累积器。
//! 两档宽容度：畸形 JSON 计入畸形上限并触发纠正/提醒；JSON 合法但语义错误
//! （未知动作、未知工具、缺工具名）只发纠正消息，不计畸形——模型在语法上
//! 邋遢但语义在轨时循环要能容忍，而对完全不产出可解析输出的模型仍然封顶。
//! 任意一次成功解析会把两个计数器同时清零。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conversation::{Conversation, Message};
use crate::core::{truncate_diag, EngineConfig, EngineError};
use crate::engine::prompts;
use crate::engine::synthesizer::{synthesize, VersionReport};
use crate::evidence::EvidenceAccumulator;
use crate::llm::LlmClient;
use crate::protocol::{classify, extract_object, PlannerAction};
use crate::tokens;
use crate::tools::{ToolGateway, UnknownTool};

/// 每轮循环状态：显式字段，仅循环实例持有，绝不进程级共享
#[derive(Debug, Default)]
struct LoopState {
    /// 总轮数（畸形/有效混合都计入，受硬上限约束）
    turns: usize,
    /// 畸形输出累计（整轮无可解析 JSON）
    malformed_turns: usize,
    /// 连续解析失败（有效解析即清零）
    consecutive_parse_failures: usize,
}

/// 扫描引擎：持有模型句柄、工具网关与配置；每次 run 独立拥有对话与证据
pub struct ScanEngine {
    llm: Arc<dyn LlmClient>,
    gateway: ToolGateway,
    config: EngineConfig,
}

impl ScanEngine {
    pub fn new(llm: Arc<dyn LlmClient>, gateway: ToolGateway, config: EngineConfig) -> Self {
        Self {
            llm,
            gateway,
            config,
        }
    }

    /// 对单个仓库执行完整扫描：探索 -> 门禁 -> 合成。
    /// 取消信号作用于整个运行，在模型往返与工具调用两个悬挂点生效。
    pub async fn run(
        &self,
        repository: &str,
        cancel: CancellationToken,
    ) -> Result<VersionReport, EngineError> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, repository, "scan run started");

        let descriptors = self.gateway.registry().descriptors();
        let system = format!(
            "{}\n\n{}",
            prompts::SYSTEM_DIRECTIVE,
            prompts::render_catalog(&descriptors)
        );
        let mut conversation = Conversation::new(system);
        conversation.push(Message::user(prompts::scan_instructions(repository)));

        let mut evidence = EvidenceAccumulator::new(
            self.config.evidence_item_bytes,
            self.config.evidence_total_bytes,
        );
        let mut state = LoopState::default();
        let mut last_output = String::new();

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if state.turns >= self.config.max_turns {
                tracing::warn!(turns = state.turns, "turn ceiling reached");
                return Err(EngineError::Exhausted {
                    turns: state.turns,
                    last_output: truncate_diag(&last_output),
                });
            }

            tracing::debug!(
                turn = state.turns,
                prompt_tokens_est = tokens::estimate_conversation(conversation.messages()),
                "planner turn"
            );

            let reply = tokio::select! {
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                r = self.llm.complete(conversation.messages(), Some(&descriptors)) => {
                    r.map_err(EngineError::Llm)?
                }
            };
            last_output = reply.clone();
            conversation.push(Message::assistant(reply.clone()));

            let value = match extract_object(&reply) {
                Some(v) => v,
                None => {
                    state.malformed_turns += 1;
                    state.consecutive_parse_failures += 1;
                    tracing::debug!(
                        malformed = state.malformed_turns,
                        consecutive = state.consecutive_parse_failures,
                        "no parseable JSON in reply"
                    );
                    if state.malformed_turns > self.config.malformed_ceiling {
                        return Err(EngineError::MalformedCeiling {
                            last_output: truncate_diag(&last_output),
                        });
                    }
                    let (first, second) = self.config.reminder_thresholds;
                    if state.consecutive_parse_failures == first
                        || state.consecutive_parse_failures == second
                    {
                        // 提醒轮不计入进度
                        conversation.push(Message::user(prompts::PROTOCOL_REMINDER));
                    } else {
                        conversation.push(Message::user(prompts::MALFORMED_CORRECTIVE));
                        state.turns += 1;
                    }
                    continue;
                }
            };

            // 任何有效解析都赦免此前的畸形轮次
            state.malformed_turns = 0;
            state.consecutive_parse_failures = 0;
            state.turns += 1;

            match classify(&value) {
                PlannerAction::Unknown => {
                    conversation.push(Message::user(prompts::UNKNOWN_ACTION_CORRECTIVE));
                }
                PlannerAction::CallTool { tool, args, reason } => {
                    if tool.is_empty() {
                        conversation.push(Message::user(prompts::MISSING_TOOL_NAME_CORRECTIVE));
                        continue;
                    }
                    if let Some(reason) = &reason {
                        tracing::debug!(%tool, %reason, "tool call requested");
                    }

                    let invoked = tokio::select! {
                        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                        r = self.gateway.invoke(&tool, &args, cancel.child_token()) => r,
                    };
                    match invoked {
                        Err(UnknownTool(name)) => {
                            conversation.push(Message::user(prompts::unknown_tool_corrective(
                                &name,
                                &descriptors,
                            )));
                        }
                        Ok(result) => {
                            evidence.harvest(&result);
                            let rendered = serde_json::to_string_pretty(&result)
                                .unwrap_or_else(|_| result.to_string());
                            conversation.push(Message::user(format!(
                                "Result of {tool}:\n{rendered}\n\n{}",
                                prompts::CONTINUE_PROMPT
                            )));
                        }
                    }
                }
                PlannerAction::FinalResult => {
                    if !evidence.has_authoritative_evidence() {
                        tracing::debug!(
                            seen = evidence.seen_count(),
                            "finalize refused: authoritative gate not satisfied"
                        );
                        conversation.push(Message::user(prompts::GATE_CORRECTIVE));
                        continue;
                    }
                    tracing::info!(
                        turns = state.turns,
                        seen = evidence.seen_count(),
                        "exploration complete, synthesizing"
                    );
                    return synthesize(&self.llm, repository, &evidence, &cancel).await;
                }
            }
        }
    }
}
