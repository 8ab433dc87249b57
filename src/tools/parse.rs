//! 本地解析工具
//!
//! 目录工具负责把仓库文件内容取回来，这两个本地工具负责从内容里抽版本号：
//! parse_json 读 global.json 的 sdk.version；parse_xml 读项目文件的
//! TargetFramework / TargetFrameworks（分号分隔的多目标也拆开）。

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

use crate::tools::registry::{params_schema, ToolInvoker};

#[derive(Debug, Deserialize, JsonSchema)]
struct FileContentArgs {
    /// 待解析的文件内容（不是路径）
    content: String,
}

fn content_arg(args: &Map<String, Value>) -> Result<String, String> {
    args.get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "Missing required argument: content".to_string())
}

/// parse_json：从 global.json 内容中取 sdk.version
pub struct ParseJsonTool;

#[async_trait]
impl ToolInvoker for ParseJsonTool {
    fn name(&self) -> &str {
        "parse_json"
    }

    fn description(&self) -> &str {
        "Parses the content of a global.json file and returns any pinned SDK version found. Args: {\"content\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<FileContentArgs>()
    }

    async fn invoke(
        &self,
        args: Map<String, Value>,
        _cancel: CancellationToken,
    ) -> Result<Value, String> {
        let content = content_arg(&args)?;
        let doc: Value = serde_json::from_str(&content)
            .map_err(|e| format!("Invalid JSON content: {}", e))?;
        let version = doc
            .get("sdk")
            .and_then(|sdk| sdk.get("version"))
            .and_then(Value::as_str);
        Ok(serde_json::json!({ "sdk_version": version }))
    }
}

/// parse_xml：从项目文件内容中取所有 TFM（含多目标）
pub struct ParseXmlTool;

fn tfm_regexes() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"<TargetFramework>\s*([^<]+?)\s*</TargetFramework>").unwrap(),
            Regex::new(r"<TargetFrameworks>\s*([^<]+?)\s*</TargetFrameworks>").unwrap(),
        )
    })
}

/// 抽取 TargetFramework（单数）与 TargetFrameworks（复数，分号分隔）的值
pub fn extract_target_frameworks(content: &str) -> Vec<String> {
    let (single, plural) = tfm_regexes();
    let mut frameworks = Vec::new();

    for cap in single.captures_iter(content) {
        let value = cap[1].trim();
        if !value.is_empty() {
            frameworks.push(value.to_string());
        }
    }
    for cap in plural.captures_iter(content) {
        for fw in cap[1].split(';') {
            let fw = fw.trim();
            if !fw.is_empty() {
                frameworks.push(fw.to_string());
            }
        }
    }
    frameworks
}

#[async_trait]
impl ToolInvoker for ParseXmlTool {
    fn name(&self) -> &str {
        "parse_xml"
    }

    fn description(&self) -> &str {
        "Parses the content of a .NET project file and returns all target frameworks found, including multi-targeting. Args: {\"content\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        params_schema::<FileContentArgs>()
    }

    async fn invoke(
        &self,
        args: Map<String, Value>,
        _cancel: CancellationToken,
    ) -> Result<Value, String> {
        let content = content_arg(&args)?;
        Ok(serde_json::json!({
            "target_frameworks": extract_target_frameworks(&content)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args_of(content: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("content".to_string(), json!(content));
        m
    }

    #[tokio::test]
    async fn test_parse_json_sdk_version() {
        let out = ParseJsonTool
            .invoke(
                args_of(r#"{"sdk": {"version": "8.0.100"}}"#),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out["sdk_version"], "8.0.100");
    }

    #[tokio::test]
    async fn test_parse_json_missing_sdk_is_null() {
        let out = ParseJsonTool
            .invoke(args_of(r#"{"projects": []}"#), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out["sdk_version"], Value::Null);
    }

    #[tokio::test]
    async fn test_parse_json_invalid_content_is_error() {
        let err = ParseJsonTool
            .invoke(args_of("not json"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.contains("Invalid JSON"));
    }

    #[test]
    fn test_extract_single_target_framework() {
        let xml = "<Project><PropertyGroup><TargetFramework>net8.0</TargetFramework></PropertyGroup></Project>";
        assert_eq!(extract_target_frameworks(xml), vec!["net8.0"]);
    }

    #[test]
    fn test_extract_multi_targeting_split_on_semicolon() {
        let xml = "<TargetFrameworks>net8.0;net9.0; netstandard2.0</TargetFrameworks>";
        assert_eq!(
            extract_target_frameworks(xml),
            vec!["net8.0", "net9.0", "netstandard2.0"]
        );
    }

    #[test]
    fn test_extract_blank_values_dropped() {
        let xml = "<TargetFrameworks>net8.0;;</TargetFrameworks><TargetFramework>  </TargetFramework>";
        assert_eq!(extract_target_frameworks(xml), vec!["net8.0"]);
    }
}
