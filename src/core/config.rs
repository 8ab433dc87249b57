//! 引擎可调参数
//!
//! 畸形输出上限与提醒阈值在不同部署下并不固定，全部收敛为配置而非硬编码常量。

/// 规划循环与证据收集的可调参数（每次运行共享同一份只读配置）
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 单次运行的总轮数硬上限（无论畸形/有效混合比例如何）
    pub max_turns: usize,
    /// 畸形输出（整轮无可解析 JSON）计数上限，超过即致命
    pub malformed_ceiling: usize,
    /// 连续解析失败达到这些次数时注入一条协议提醒消息
    pub reminder_thresholds: (usize, usize),
    /// 单条证据内容的字节预算（超出截断）
    pub evidence_item_bytes: usize,
    /// 证据总量的序列化字节上限（超出则整批丢弃）
    pub evidence_total_bytes: usize,
    /// 工具名查找是否忽略大小写
    pub case_insensitive_tools: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 24,
            malformed_ceiling: 6,
            reminder_thresholds: (2, 4),
            evidence_item_bytes: 4096,
            evidence_total_bytes: 64 * 1024,
            case_insensitive_tools: false,
        }
    }
}
