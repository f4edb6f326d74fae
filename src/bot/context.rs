//! Conversation-context assembly for the generator.

use crate::ai::ChatMessage;
use crate::db::{MessageStore, StoreError};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant in a group chat. \
     Be as human sounding as possible and long winded.";

/// Build the message sequence for one generation call: a system turn,
/// then up to `limit` messages older than the trigger (oldest first,
/// `is_from_me` -> assistant), then the extracted prompt as the final
/// user turn. Rebuilt from a fresh store query every time.
pub fn build_context(
    store: &dyn MessageStore,
    chat_id: i64,
    before_id: i64,
    prompt: &str,
    limit: usize,
) -> Result<Vec<ChatMessage>, StoreError> {
    let history = store.recent_messages_before(chat_id, before_id, limit)?;

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    for msg in history {
        // Rows whose text couldn't be recovered carry nothing for the model.
        if msg.text.is_empty() {
            continue;
        }
        let turn = if msg.is_from_me {
            ChatMessage::assistant(msg.text)
        } else {
            ChatMessage::user(msg.text)
        };
        messages.push(turn);
    }
    messages.push(ChatMessage::user(prompt));
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MessageRole;
    use crate::db::Message;
    use chrono::Utc;

    struct VecStore(Vec<Message>);

    fn msg(id: i64, text: &str, is_from_me: bool) -> Message {
        Message {
            id,
            chat_id: 1,
            sender: None,
            text: text.to_string(),
            timestamp: Utc::now(),
            is_from_me,
        }
    }

    impl MessageStore for VecStore {
        fn latest_message_id(&self, _chat_id: i64) -> Result<Option<i64>, StoreError> {
            Ok(self.0.iter().map(|m| m.id).max())
        }

        fn messages_since(
            &self,
            _chat_id: i64,
            after_id: i64,
        ) -> Result<Vec<Message>, StoreError> {
            Ok(self.0.iter().filter(|m| m.id > after_id).cloned().collect())
        }

        fn recent_messages_before(
            &self,
            _chat_id: i64,
            before_id: i64,
            limit: usize,
        ) -> Result<Vec<Message>, StoreError> {
            let mut older: Vec<Message> =
                self.0.iter().filter(|m| m.id < before_id).cloned().collect();
            older.sort_by_key(|m| m.id);
            let skip = older.len().saturating_sub(limit);
            Ok(older.into_iter().skip(skip).collect())
        }
    }

    #[test]
    fn test_context_shape() {
        let store = VecStore(vec![
            msg(1, "hey", false),
            msg(2, "hi there", true),
            msg(3, "how are you", false),
        ]);
        let context = build_context(&store, 1, 4, "what's up", 20).unwrap();

        assert_eq!(context.len(), 5);
        assert_eq!(context[0].role, MessageRole::System);
        assert_eq!(context[1].content, "hey");
        assert_eq!(context[1].role, MessageRole::User);
        assert_eq!(context[2].role, MessageRole::Assistant);
        assert_eq!(context[3].content, "how are you");
        assert_eq!(context[4].role, MessageRole::User);
        assert_eq!(context[4].content, "what's up");
    }

    #[test]
    fn test_context_caps_history_keeping_most_recent() {
        let store = VecStore((1..=30).map(|id| msg(id, &format!("m{}", id), false)).collect());
        let context = build_context(&store, 1, 31, "now", 5).unwrap();

        // system + 5 prior + prompt
        assert_eq!(context.len(), 7);
        assert_eq!(context[1].content, "m26");
        assert_eq!(context[5].content, "m30");
        assert_eq!(context[6].content, "now");
    }

    #[test]
    fn test_context_excludes_trigger_and_newer() {
        let store = VecStore(vec![
            msg(1, "old", false),
            msg(2, "@zbot trigger", false),
            msg(3, "arrived during responding", false),
        ]);
        let context = build_context(&store, 1, 2, "trigger", 20).unwrap();

        assert_eq!(context.len(), 3);
        assert_eq!(context[1].content, "old");
        assert_eq!(context[2].content, "trigger");
    }

    #[test]
    fn test_context_skips_unrecoverable_rows() {
        let store = VecStore(vec![msg(1, "", false), msg(2, "real", false)]);
        let context = build_context(&store, 1, 3, "p", 20).unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[1].content, "real");
    }
}
