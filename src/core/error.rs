//! 引擎错误类型
//!
//! 只有致命条件才会成为 EngineError 浮出给调用方；可恢复条件（JSON 解析失败、
//! 未知工具、过早 finalize）由规划循环内部的纠正消息消化，调用方不可见。

use thiserror::Error;

/// 诊断文本的最大保留字节数（致命错误附带最后一次模型原始输出的截断片段）
pub const DIAG_TEXT_MAX_BYTES: usize = 600;

/// 扫描运行的致命错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 迭代总数达到硬上限
    #[error("Turn limit exhausted after {turns} turns")]
    Exhausted { turns: usize, last_output: String },

    /// 连续畸形输出达到上限（整轮没有出现过可解析 JSON 的间隔）
    #[error("Malformed output ceiling reached")]
    MalformedCeiling { last_output: String },

    /// 合成阶段无法产出可解析的 JSON（按设计不重试，直接浮出）
    #[error("Synthesis failed: {detail}")]
    Synthesis { detail: String, last_output: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Model not available")]
    ModelUnavailable,

    #[error("Cancelled")]
    Cancelled,
}

/// 截断诊断文本到固定字节数（按字符边界），超出时附省略标记
pub fn truncate_diag(text: &str) -> String {
    if text.len() <= DIAG_TEXT_MAX_BYTES {
        return text.to_string();
    }
    let mut end = DIAG_TEXT_MAX_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
