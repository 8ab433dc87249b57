//! Token 估算（字符计数近似）
//!
//! 只用于日志与提示词体量观测，不参与任何裁剪决策。
//! 英文约 4 字符/token，非 ASCII 约 1.5 字符/token。

use crate::conversation::Message;

/// 估算单段文本的 token 数
pub fn estimate(text: &str) -> usize {
    if text.trim().is_empty() {
        return 0;
    }

    let mut ascii_chars = 0usize;
    let mut non_ascii_chars = 0usize;
    for c in text.chars() {
        if c.is_ascii() {
            ascii_chars += 1;
        } else {
            non_ascii_chars += 1;
        }
    }

    let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
    tokens.max(1)
}

/// 估算整段对话的 token 数（角色名也占 token）
pub fn estimate_conversation(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| estimate(&format!("{:?}", m.role)) + estimate(&m.content))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_empty_is_zero() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("   "), 0);
    }

    #[test]
    fn test_estimate_ascii_quarter() {
        assert_eq!(estimate("abcdefgh"), 2);
    }

    #[test]
    fn test_estimate_conversation_sums_roles_and_content() {
        let messages = vec![Message::user("hello world"), Message::assistant("ok")];
        assert!(estimate_conversation(&messages) >= estimate("hello world"));
    }
}
