//! 协议抽取器：从任意自由文本中拉出第一个语法有效的 JSON 值
//!
//! 纯函数，不产生副作用；抽取失败返回 None 而非错误——畸形输出是常态，
//! 重试策略由调用方（规划循环 / 合规流水线）决定。

use serde_json::Value;

/// 对象模式：从左到右扫描平衡的 `{...}` 子串，返回第一个能解析为 JSON 对象的候选。
/// 扫描对字符串字面量敏感（引号内的花括号不参与配对），候选前后的文本全部忽略。
pub fn extract_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find('{') {
        let start = search_from + rel;
        if let Some(end) = find_balanced_end(bytes, start) {
            let candidate = &text[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() {
                    return Some(value);
                }
            }
            // 候选不合法：从它的下一个字符继续找下一个起点
        }
        search_from = start + 1;
        if search_from >= text.len() {
            break;
        }
    }
    None
}

/// 数组模式：优先找 ```json 围栏块且内部解析为 JSON 数组；没有围栏时回退到
/// 最宽 `[...]` 跨度（首个 `[` 到最后一个 `]`）。只接受解析结果确实是数组的候选，
/// 空对象 `{}` 虽是合法 JSON 但永远不作为有效数组结果。
pub fn extract_array(text: &str) -> Option<Value> {
    if let Some(inner) = fenced_block(text) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            if value.is_array() {
                return Some(value);
            }
        }
    }

    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    let candidate = &text[start..=end];
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_array() => Some(value),
        _ => None,
    }
}

/// 取 ```json ... ``` 围栏内部文本
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json")?;
    let rest = &text[start + "```json".len()..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

/// 从 open 位置（必须是 '{'）起找平衡的闭括号位置；追踪字符串与转义，
/// 不平衡时返回 None
fn find_balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_object_plain() {
        let v = extract_object(r#"{"tool": "get_file", "args": {}}"#).unwrap();
        assert_eq!(v["tool"], "get_file");
    }

    #[test]
    fn test_extract_object_surrounded_by_prose() {
        let text = r#"Sure! Here is my call: {"action": "call_tool", "tool": "ls"} hope it helps"#;
        let v = extract_object(text).unwrap();
        assert_eq!(v["action"], "call_tool");
    }

    #[test]
    fn test_extract_object_braces_inside_strings() {
        let text = r#"noise {"msg": "a { tricky } value", "n": 1} tail"#;
        let v = extract_object(text).unwrap();
        assert_eq!(v["msg"], "a { tricky } value");
        assert_eq!(v["n"], 1);
    }

    #[test]
    fn test_extract_object_skips_invalid_first_candidate() {
        let text = r#"{not json} and then {"ok": true}"#;
        let v = extract_object(text).unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn test_extract_object_none_on_garbage() {
        assert!(extract_object("no json here at all").is_none());
        assert!(extract_object("{broken").is_none());
    }

    #[test]
    fn test_extract_object_is_pure() {
        let text = r#"prefix {"a": [1, 2]} suffix"#;
        assert_eq!(extract_object(text), extract_object(text));
    }

    #[test]
    fn test_extract_array_fenced() {
        let text = "Here you go:\n```json\n[{\"Check\": \"title\"}]\n```\ndone";
        let v = extract_array(text).unwrap();
        assert_eq!(v, json!([{"Check": "title"}]));
    }

    #[test]
    fn test_extract_array_bracket_fallback() {
        let text = r#"result: [1, 2, 3] as requested"#;
        assert_eq!(extract_array(text).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_extract_array_rejects_empty_object() {
        // `{}` 是合法 JSON 但不是数组，必须视为畸形输出
        assert!(extract_array("{}").is_none());
        assert!(extract_array("```json\n{}\n```").is_none());
    }

    #[test]
    fn test_extract_array_rejects_object_in_fence() {
        assert!(extract_array("```json\n{\"a\": 1}\n```").is_none());
    }

    #[test]
    fn test_extract_array_none_when_missing() {
        assert!(extract_array("nothing to see").is_none());
        assert!(extract_array("half [1, 2").is_none());
    }
}
