//! Prompt text handed to the language model

use super::types::{Danmaku, Language};

/// Chinese header; only the newest message follows
pub const ZH_HEADER: &str = "收到的弹幕如下：\n";

/// Japanese task header; every message follows
pub const JA_HEADER: &str = "【追加タスク】配信の視聴者からコメントが届きました。まずコメントを読み上げてください（言語が異なる場合は、まず翻訳してから翻訳結果を読み上げてください）。その後、コメントに対して返答してください。コメント内容は以下の通り：\n";

/// Format new messages as a prompt; empty input gives an empty prompt
pub fn format_prompt(messages: &[Danmaku], language: Language) -> String {
    if messages.is_empty() {
        return String::new();
    }

    match language {
        Language::Zh => {
            let mut prompt = String::from(ZH_HEADER);
            // At most one message, the newest
            if let Some(last) = messages.last() {
                prompt.push_str(&format!("用户“{}”: {}\n", last.username, last.content));
            }
            prompt
        }
        Language::Ja => {
            let mut prompt = String::from(JA_HEADER);
            for msg in messages {
                prompt.push_str(&format!(
                    "コメント内容: {} （ユーザー「{}」より）\n",
                    msg.content, msg.username
                ));
            }
            prompt
        }
    }
}
