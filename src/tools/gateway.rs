//! 工具调用网关
//!
//! invoke(tool, raw_args, cancel)：先把异构参数编码规范化为统一的字符串键 map，
//! 再按名分发；底层调用抛出的任何失败都转成结构化失败负载
//! {"tool", "error": true, "message"}，循环绝不因单次工具失败而中止。
//! 每次调用输出一条结构化审计日志（JSON），不影响结果契约。

use std::time::Instant;

use serde_json::{Map, Number, Value};
use tokio_util::sync::CancellationToken;

use crate::tools::registry::ToolRegistry;

/// 名字查找失败（可恢复：调用方应回给模型一条纠正消息而非中止）
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownTool(pub String);

/// 工具调用网关：持有注册表，负责参数规范化、分发与失败隔离
pub struct ToolGateway {
    registry: ToolRegistry,
}

impl ToolGateway {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 调用指定工具。未知名字返回 UnknownTool；已知工具的执行失败
    /// 被吸收为结构化失败负载并以 Ok 返回。
    pub async fn invoke(
        &self,
        tool_name: &str,
        raw_args: &Value,
        cancel: CancellationToken,
    ) -> Result<Value, UnknownTool> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| UnknownTool(tool_name.to_string()))?;

        let args = normalize_args(Some(raw_args));
        let start = Instant::now();
        let result = tool.invoke(args, cancel).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        Ok(match result {
            Ok(value) => value,
            Err(message) => serde_json::json!({
                "tool": tool_name,
                "error": true,
                "message": message,
            }),
        })
    }
}

/// 把异构参数编码统一为字符串键 map：
/// - 缺失 / null / 非对象 -> 空 map
/// - 对象 -> 逐键规范化（见 normalize_value）
pub fn normalize_args(raw: Option<&Value>) -> Map<String, Value> {
    match raw {
        Some(Value::Object(obj)) => obj
            .iter()
            .map(|(k, v)| (k.clone(), normalize_value(v)))
            .collect(),
        _ => Map::new(),
    }
}

/// 单值规范化：数字在能精确落到 i64 时取整数否则取浮点；嵌套对象递归；
/// 嵌套数组转为其文本形式（刻意的扁平化，须保留）
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(Number::from(i))
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        Value::Array(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}
