//! Ollama 模型可用性探针
//!
//! 引擎只管编排，不管模型在不在：这里负责确认 Ollama 已下载所需模型，
//! 缺失时发起拉取。只在进程启动与扫描入口处使用，失败不阻塞 HTTP 服务本身。

use std::time::Duration;

use serde_json::Value;

/// 拉取发起后等待多久再复查可用性
const PULL_RECHECK_DELAY: Duration = Duration::from_secs(5);

/// Ollama 探针：端点 + 模型名
pub struct OllamaProbe {
    endpoint: String,
    model: String,
    http: reqwest::Client,
}

impl OllamaProbe {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 查询 /api/tags 判断模型是否已就绪；名字完全一致（忽略大小写）
    /// 或以冒号前的基名为前缀都算命中
    pub async fn is_model_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query Ollama tags");
                return false;
            }
        };
        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "Failed to decode Ollama tags response");
                return false;
            }
        };

        let base = self.model.split(':').next().unwrap_or(&self.model);
        let models = body.get("models").and_then(Value::as_array);
        let found = models.into_iter().flatten().any(|m| {
            m.get("name")
                .and_then(Value::as_str)
                .map(|name| {
                    name.eq_ignore_ascii_case(&self.model)
                        || name.to_lowercase().starts_with(&base.to_lowercase())
                })
                .unwrap_or(false)
        });

        tracing::debug!(model = %self.model, found, "Ollama model availability check");
        found
    }

    /// 发起模型拉取并在短暂等待后复查
    pub async fn pull_model(&self) -> bool {
        tracing::info!(model = %self.model, "Pulling model. This may take several minutes");
        let url = format!("{}/api/pull", self.endpoint);
        let body = serde_json::json!({ "name": self.model });

        match self.http.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tokio::time::sleep(PULL_RECHECK_DELAY).await;
                self.is_model_available().await
            }
            Ok(response) => {
                tracing::error!(model = %self.model, status = %response.status(), "Model pull rejected");
                false
            }
            Err(e) => {
                tracing::error!(model = %self.model, error = %e, "Model pull failed");
                false
            }
        }
    }

    /// 确认模型就绪：已可用直接通过，否则尝试拉取一次
    pub async fn ensure_loaded(&self) -> bool {
        if self.is_model_available().await {
            tracing::info!(model = %self.model, "Model already available");
            return true;
        }
        tracing::warn!(model = %self.model, "Model not found. Attempting to pull");
        if self.pull_model().await {
            tracing::info!(model = %self.model, "Model successfully pulled");
            return true;
        }
        tracing::error!(model = %self.model, "Failed to ensure model is available");
        false
    }
}
