//! 规划与合成的提示词
//!
//! 文本协议的全部措辞集中在这里：system 指令、扫描任务说明、各类纠正消息。
//! 纠正消息分两档：畸形 JSON（计入畸形上限）与协议内但语义错误（不计入）。

use crate::tools::ToolDescriptor;

/// 固定 system 指令：声明文本协议（每轮恰好一个 JSON 对象）
pub const SYSTEM_DIRECTIVE: &str = "\
You are a repository analysis agent. You interact ONLY through a strict text protocol.\n\
On every turn you must output exactly one JSON object, with no surrounding commentary:\n\
- To invoke a tool: {\"action\": \"call_tool\", \"tool\": \"<name>\", \"args\": {...}, \"reason\": \"<short why>\"}\n\
- When you have gathered enough evidence: {\"action\": \"final_result\"}\n\
Never output anything except one of these two objects.";

/// 扫描任务说明（用户首条消息）
pub fn scan_instructions(repository: &str) -> String {
    format!(
        "Repository target: {repository}\n\n\
         Perform the complete .NET version scan (DO NOT stop after listing repository metadata):\n\
         1. Traverse the repository using available tools until all relevant files are examined.\n\
         2. Collect data from: global.json, *.csproj, *.fsproj, *.vbproj, Directory.Build.props, Directory.Build.targets, Dockerfile*, *.yml, *.yaml.\n\
         3. Note every SDK version, runtime/container version and target framework you encounter.\n\
         If you have not yet read the necessary files, use additional tool calls before requesting the final result."
    )
}

/// 渲染工具目录段落，拼进 system 指令
pub fn render_catalog(descriptors: &[ToolDescriptor]) -> String {
    let mut out = String::from("Available tools:\n");
    for d in descriptors {
        out.push_str(&format!("- {}: {}\n", d.name, d.description));
        if !d.parameters.is_null() {
            out.push_str(&format!("  parameters: {}\n", d.parameters));
        }
    }
    out
}

/// 畸形输出纠正（短）：上一轮没有可解析的 JSON
pub const MALFORMED_CORRECTIVE: &str = "\
Your previous output contained no parseable JSON object. \
Reply with exactly one JSON object as specified, nothing else.";

/// 协议提醒（连续解析失败达到阈值时注入的强化版）
pub const PROTOCOL_REMINDER: &str = "\
PROTOCOL REMINDER. Every reply must be exactly one JSON object:\n\
{\"action\": \"call_tool\", \"tool\": \"<name>\", \"args\": {...}, \"reason\": \"...\"}\n\
or {\"action\": \"final_result\"}\n\
No markdown, no code fences, no commentary. Output the JSON object only.";

/// 语义错误纠正：JSON 合法但动作不可识别
pub const UNKNOWN_ACTION_CORRECTIVE: &str = "\
Unrecognized action. Use \"call_tool\" or \"final_result\" only.";

/// 语义错误纠正：call_tool 缺工具名
pub const MISSING_TOOL_NAME_CORRECTIVE: &str = "\
The call_tool action requires a non-empty \"tool\" field naming one of the available tools.";

/// 语义错误纠正：未知工具名
pub fn unknown_tool_corrective(name: &str, available: &[ToolDescriptor]) -> String {
    let names: Vec<&str> = available.iter().map(|d| d.name.as_str()).collect();
    format!(
        "Unknown tool \"{}\". Available tools: {}.",
        name,
        names.join(", ")
    )
}

/// 门禁纠正：证据不足以 finalize
pub const GATE_CORRECTIVE: &str = "\
Not enough evidence to finalize: no project file, SDK pin file or build \
customization file has been examined yet. Continue exploring the repository \
with tool calls before requesting the final result.";

/// 工具结果后的续行提示
pub const CONTINUE_PROMPT: &str = "\
Continue with another tool call, or output {\"action\": \"final_result\"} once \
all relevant files have been examined.";

/// 合成阶段 system 指令（全新对话，不携带探索历史）
pub const SYNTHESIS_SYSTEM: &str = "\
You turn collected repository evidence into a single JSON object. \
Output ONLY the JSON object matching the requested schema. \
No commentary, no markdown, no code fences.";

/// 合成阶段用户消息：证据 + 目标 schema
pub fn synthesis_request(repository: &str, evidence_block: &str, schema_json: &str) -> String {
    format!(
        "Repository: {repository}\n\n\
         Evidence collected from the repository:\n{evidence_block}\n\
         Produce the scan result as one JSON object exactly matching this schema:\n{schema_json}\n\
         Deduplicate values. Output ONLY the JSON object."
    )
}
