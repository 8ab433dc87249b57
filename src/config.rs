//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NETCHECK__*` 覆盖
//! （双下划线表示嵌套，如 `NETCHECK__LLM__MODEL=llama3.2:8b`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::EngineConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub ollama: OllamaSection,
    pub engine: EngineSection,
    pub compliance: ComplianceSection,
}

/// [server] 段：监听地址与整次运行的超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    /// 单次扫描运行的总超时（秒）；作用于整个运行而非单轮
    pub run_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            run_timeout_secs: 300,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点与模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// OpenAI 兼容端点；默认指向本机 Ollama 的 /v1 表面
    pub base_url: Option<String>,
    pub model: String,
    /// API key；未设置时回退 OPENAI_API_KEY 环境变量
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: Some("http://localhost:11434/v1".to_string()),
            model: "llama3.2:8b".to_string(),
            api_key: None,
        }
    }
}

/// [ollama] 段：模型可用性探针
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaSection {
    pub endpoint: String,
    pub model: String,
    /// 启动时是否后台校验模型可用性
    pub validate_on_start: bool,
}

impl Default for OllamaSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:8b".to_string(),
            validate_on_start: true,
        }
    }
}

/// [engine] 段：规划循环与证据收集的可调参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_turns: usize,
    pub malformed_ceiling: usize,
    pub reminder_first: usize,
    pub reminder_second: usize,
    pub evidence_item_bytes: usize,
    pub evidence_total_bytes: usize,
    pub case_insensitive_tools: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        let d = EngineConfig::default();
        Self {
            max_turns: d.max_turns,
            malformed_ceiling: d.malformed_ceiling,
            reminder_first: d.reminder_thresholds.0,
            reminder_second: d.reminder_thresholds.1,
            evidence_item_bytes: d.evidence_item_bytes,
            evidence_total_bytes: d.evidence_total_bytes,
            case_insensitive_tools: d.case_insensitive_tools,
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_turns: self.max_turns,
            malformed_ceiling: self.malformed_ceiling,
            reminder_thresholds: (self.reminder_first, self.reminder_second),
            evidence_item_bytes: self.evidence_item_bytes,
            evidence_total_bytes: self.evidence_total_bytes,
            case_insensitive_tools: self.case_insensitive_tools,
        }
    }
}

/// [compliance] 段：每阶段的尝试上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplianceSection {
    pub max_attempts: usize,
}

impl Default for ComplianceSection {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// 从 config 目录加载配置，环境变量 NETCHECK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NETCHECK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NETCHECK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
