//! 工具注册表
//!
//! 外部工具目录只在边界上被认识：每个能力表现为一个 ToolInvoker（name /
//! description / 参数 schema / invoke），由 ToolRegistry 按名注册与查找。
//! 名字匹配的大小写规则是注册表的显式配置，默认大小写敏感。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::schema_for;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// 工具描述符：目录提供的只读元数据，供拼进规划提示词
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// 参数 JSON Schema（可选；提示词中帮助模型给出正确参数）
    #[serde(skip_serializing_if = "Value::is_null")]
    pub parameters: Value,
}

/// 绑定到单个工具的调用能力：规范化后的参数进、结果或结构化失败出
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// 工具名称（JSON 协议中 "tool" 字段的值）
    fn name(&self) -> &str;

    /// 工具描述（供模型理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象 schema 表示无参数或格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行调用；取消信号必须中止在途请求
    async fn invoke(
        &self,
        args: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<Value, String>;
}

/// 工具注册表：按名存储 Arc<dyn ToolInvoker>，大小写匹配规则可配置
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolInvoker>>,
    case_insensitive: bool,
}

impl ToolRegistry {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            tools: HashMap::new(),
            case_insensitive,
        }
    }

    fn key_of(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    pub fn register(&mut self, tool: impl ToolInvoker + 'static) {
        let key = self.key_of(tool.name());
        self.tools.insert(key, Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolInvoker>) {
        let key = self.key_of(tool.name());
        self.tools.insert(key, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolInvoker>> {
        self.tools.get(&self.key_of(name)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 描述符列表，供规划提示词中的 Available tools 段落
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut list: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}

/// 由类型派生参数 schema（T: JsonSchema）
pub fn params_schema<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTool;

    #[async_trait]
    impl ToolInvoker for NoopTool {
        fn name(&self) -> &str {
            "Get_File"
        }
        fn description(&self) -> &str {
            "noop"
        }
        async fn invoke(
            &self,
            _args: Map<String, Value>,
            _cancel: CancellationToken,
        ) -> Result<Value, String> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_case_sensitive_lookup_default() {
        let mut reg = ToolRegistry::new(false);
        reg.register(NoopTool);
        assert!(reg.get("Get_File").is_some());
        assert!(reg.get("get_file").is_none());
    }

    #[test]
    fn test_case_insensitive_lookup_opt_in() {
        let mut reg = ToolRegistry::new(true);
        reg.register(NoopTool);
        assert!(reg.get("get_file").is_some());
        assert!(reg.get("GET_FILE").is_some());
    }

    #[test]
    fn test_descriptors_sorted_by_name() {
        let mut reg = ToolRegistry::new(false);
        reg.register(NoopTool);
        let d = reg.descriptors();
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].name, "Get_File");
    }
}
