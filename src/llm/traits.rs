//! LLM 客户端抽象
//!
//! 模型后端是不透明的请求/响应协作者：send(对话, 工具目录?) -> 回复文本。
//! 回复可能附带模型自己的结构化 tool-call 记录，本系统刻意不依赖它——
//! 模型未必稳定走原生通道，文本协议才是唯一契约。

use async_trait::async_trait;

use crate::conversation::Message;
use crate::tools::ToolDescriptor;

/// LLM 客户端 trait：一次完整的对话重放 -> 一条 assistant 文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 发送完整对话（可带工具目录），取回 assistant 文本正文
    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDescriptor]>,
    ) -> Result<String, String>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
