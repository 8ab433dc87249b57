//! NetCheck - LLM 驱动的仓库 .NET 版本扫描与 PR 合规检查
//!
//! 模块划分：
//! - **api**: HTTP 表面（axum 路由与状态码映射）
//! - **compliance**: PR 合规检查的带标签数组重试流水线
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 单次运行内只追加的对话状态
//! - **core**: 引擎错误与可调参数
//! - **engine**: 规划循环、规范化合成器与提示词
//! - **evidence**: 证据累积器（收割、截断、权威门禁）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）、Ollama 探针
//! - **protocol**: 文本协议层（JSON 抽取与动作分类）
//! - **tokens**: token 估算（日志用）
//! - **tools**: 工具注册表、调用网关与本地解析工具

pub mod api;
pub mod compliance;
pub mod config;
pub mod conversation;
pub mod core;
pub mod engine;
pub mod evidence;
pub mod llm;
pub mod observability;
pub mod protocol;
pub mod tokens;
pub mod tools;

pub use compliance::{ComplianceFinding, CompliancePipeline};
pub use crate::core::{EngineConfig, EngineError};
pub use engine::{ScanEngine, VersionReport};
