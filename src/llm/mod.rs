//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与 Ollama 可用性探针

pub mod mock;
pub mod ollama;
pub mod openai;
pub mod traits;

pub use mock::ScriptedLlm;
pub use ollama::OllamaProbe;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
