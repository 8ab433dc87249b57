//! 工具层：注册表、调用网关与本地解析工具
//!
//! 远端目录工具（仓库浏览等）只在边界上被认识（名字 + 统一 invoke 契约）；
//! parse_json / parse_xml 是进程内的本地能力，与目录工具同样注册进网关。

pub mod gateway;
pub mod parse;
pub mod registry;

pub use gateway::{normalize_args, ToolGateway, UnknownTool};
pub use parse::{extract_target_frameworks, ParseJsonTool, ParseXmlTool};
pub use registry::{params_schema, ToolDescriptor, ToolInvoker, ToolRegistry};
