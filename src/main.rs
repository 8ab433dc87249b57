//! netcheck 服务入口
//!
//! 装配：配置 -> LLM 客户端 -> Ollama 探针 -> 工具注册 -> 引擎/流水线 -> HTTP。
//! 启动时后台校验模型可用性（失败只告警，不阻塞服务）。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use netcheck::api::{router, AppState};
use netcheck::compliance::CompliancePipeline;
use netcheck::config::load_config;
use netcheck::engine::ScanEngine;
use netcheck::llm::{LlmClient, OllamaProbe, OpenAiClient};
use netcheck::observability;
use netcheck::tools::{ParseJsonTool, ParseXmlTool, ToolGateway, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("failed to load configuration")?;
    tracing::info!(bind = %cfg.server.bind_addr, model = %cfg.llm.model, "starting netcheck");

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        cfg.llm.base_url.as_deref(),
        &cfg.llm.model,
        cfg.llm.api_key.as_deref(),
    ));

    let probe = Arc::new(OllamaProbe::new(
        cfg.ollama.endpoint.clone(),
        cfg.ollama.model.clone(),
    ));

    // 启动期模型校验：后台执行，失败不阻塞 HTTP 服务
    if cfg.ollama.validate_on_start {
        let probe = probe.clone();
        tokio::spawn(async move {
            if !probe.ensure_loaded().await {
                tracing::warn!(
                    model = %probe.model(),
                    "model validation failed at startup; scans will be rejected until it is available"
                );
            }
        });
    }

    // 工具注册：本地解析工具；远端目录工具由部署方通过库 API 注入
    let mut registry = ToolRegistry::new(cfg.engine.case_insensitive_tools);
    registry.register(ParseJsonTool);
    registry.register(ParseXmlTool);

    let engine = Arc::new(ScanEngine::new(
        llm.clone(),
        ToolGateway::new(registry),
        cfg.engine.to_engine_config(),
    ));
    let pipeline = Arc::new(CompliancePipeline::new(
        llm.clone(),
        cfg.compliance.max_attempts,
    ));

    let state = AppState {
        engine,
        pipeline,
        probe,
        run_timeout: Duration::from_secs(cfg.server.run_timeout_secs),
    };

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.bind_addr))?;
    axum::serve(listener, router(state))
        .await
        .context("server error")?;

    Ok(())
}
