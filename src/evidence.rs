//! 证据累积器
//!
//! 从工具结果（JSON 树）中递归收割 路径/名字 -> 内容 片段：对象节点上按固定
//! 优先级选键（路径型字段优先于名字型），无论当前节点是否产出记录都继续递归
//! 全部属性与数组元素。键按大小写不敏感去重（键集只增，内容后写覆盖）；
//! 单条内容有字节预算，整体序列化有硬上限——超限的那一批整体丢弃，绝不半套用。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::RegexSet;
use serde_json::Value;

/// 截断标记（附加后总长仍不超过单条预算）
const TRUNCATION_MARKER: &str = "...[truncated]";

/// 路径型键字段，优先级高于名字型
const PATH_FIELDS: [&str; 4] = ["path", "file_path", "filepath", "full_path"];
/// 名字型键字段
const NAME_FIELDS: [&str; 2] = ["name", "filename"];
/// 内容型字段
const CONTENT_FIELDS: [&str; 3] = ["content", "text", "body"];

/// 权威文件名模式：命中任意一个即允许离开探索阶段
fn authoritative_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(^|/)global\.json$",
            r"\.csproj$",
            r"\.fsproj$",
            r"\.vbproj$",
            r"(^|/)directory\.build\.props$",
            r"(^|/)directory\.build\.targets$",
            r"(^|/)dockerfile[^/]*$",
            r"\.ya?ml$",
        ])
        .expect("authoritative patterns are valid regexes")
    })
}

/// 证据累积器：seen 键集 + 键 -> 截断内容 映射，均按小写键归一
#[derive(Debug, Default)]
pub struct EvidenceAccumulator {
    seen: BTreeSet<String>,
    content: BTreeMap<String, String>,
    item_budget: usize,
    total_budget: usize,
}

impl EvidenceAccumulator {
    pub fn new(item_budget: usize, total_budget: usize) -> Self {
        Self {
            seen: BTreeSet::new(),
            content: BTreeMap::new(),
            item_budget,
            total_budget,
        }
    }

    /// 从单个工具结果收割证据。结果本身序列化超过总上限时整体跳过
    /// （该次工具调用在循环视角下仍然发生过）；收割出的批次若会使
    /// 累计序列化量越过上限，同样整批丢弃。
    pub fn harvest(&mut self, result: &Value) {
        let serialized_len = result.to_string().len();
        if serialized_len > self.total_budget {
            tracing::debug!(
                bytes = serialized_len,
                ceiling = self.total_budget,
                "evidence harvest skipped: result over total ceiling"
            );
            return;
        }

        let mut batch: Vec<(String, Option<String>)> = Vec::new();
        collect(result, self.item_budget, &mut batch);
        if batch.is_empty() {
            return;
        }

        let batch_bytes: usize = batch
            .iter()
            .map(|(k, c)| k.len() + c.as_deref().map_or(0, str::len))
            .sum();
        if self.total_bytes() + batch_bytes > self.total_budget {
            tracing::debug!(
                batch_bytes,
                ceiling = self.total_budget,
                "evidence harvest discarded: accumulated ceiling would be exceeded"
            );
            return;
        }

        for (key, content) in batch {
            self.seen.insert(key.clone());
            if let Some(content) = content {
                self.content.insert(key, content);
            }
        }
    }

    /// 当前累计证据的近似序列化字节量
    fn total_bytes(&self) -> usize {
        self.content.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// 是否已见到至少一个权威文件（项目文件 / SDK 钉版文件 / 构建定制文件）。
    /// 这是离开探索阶段的唯一门禁。
    pub fn has_authoritative_evidence(&self) -> bool {
        self.seen
            .iter()
            .any(|key| authoritative_patterns().is_match(key))
    }

    /// 已见键集（小写归一）
    pub fn seen_keys(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// 键 -> 内容 条目（合成提示词用）
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.content.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// 按字节预算截断：结果（含标记）不超过 budget，且幂等——
/// 对已截断的内容再次施加同一预算不再改变它
pub fn truncate_item(content: &str, budget: usize) -> String {
    if content.len() <= budget {
        return content.to_string();
    }
    let keep = budget.saturating_sub(TRUNCATION_MARKER.len());
    let mut end = keep.min(content.len());
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &content[..end], TRUNCATION_MARKER)
}

/// 递归访问者：对象节点尝试产出 (键, 内容) 记录，然后继续深入全部子节点
fn collect(node: &Value, item_budget: usize, batch: &mut Vec<(String, Option<String>)>) {
    match node {
        Value::Object(obj) => {
            let key = PATH_FIELDS
                .iter()
                .chain(NAME_FIELDS.iter())
                .find_map(|f| obj.get(*f).and_then(Value::as_str))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty());

            if let Some(key) = key {
                let content = CONTENT_FIELDS
                    .iter()
                    .find_map(|f| obj.get(*f).and_then(Value::as_str))
                    .map(|c| truncate_item(c, item_budget));
                batch.push((key.to_lowercase(), content));
            }

            for value in obj.values() {
                collect(value, item_budget, batch);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, item_budget, batch);
            }
        }
        _ => {}
    }
}
