//! 脚本化 Mock LLM 客户端（用于测试，无需后端）
//!
//! 按预置脚本逐条吐出回复；脚本耗尽后重复最后一条。记录调用次数供断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::conversation::Message;
use crate::llm::LlmClient;
use crate::tools::ToolDescriptor;

/// 脚本化客户端：每次 complete 弹出脚本中的下一条回复
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let replies: VecDeque<String> = replies.into_iter().map(Into::into).collect();
        let last = replies.back().cloned().unwrap_or_default();
        Self {
            replies: Mutex::new(replies),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    /// 已发生的模型轮次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolDescriptor]>,
    ) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let popped = self.replies.lock().unwrap().pop_front();
        match popped {
            Some(reply) => {
                *self.last.lock().unwrap() = reply.clone();
                Ok(reply)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}
