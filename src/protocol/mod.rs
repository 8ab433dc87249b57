//! 文本协议层：JSON 抽取与动作分类
//!
//! 模型可能走自己的原生 tool-call 通道，也可能不走；本层只信文本协议，
//! 从自由文本中抽取 JSON 并归类为显式动作。

pub mod action;
pub mod extract;

pub use action::{classify, PlannerAction};
pub use extract::{extract_array, extract_object};
