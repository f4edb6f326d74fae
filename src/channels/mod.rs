pub mod imessage;

pub use imessage::IMessageSender;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

/// How a reply is addressed: group chats go by chat name, 1:1 chats by
/// the phone/email handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Handle(String),
    GroupName(String),
}

impl ChatTarget {
    pub fn from_name(name: &str) -> Self {
        if name.starts_with('+') || name.contains('@') {
            ChatTarget::Handle(name.to_string())
        } else {
            ChatTarget::GroupName(name.to_string())
        }
    }
}

/// Delivery seam for the monitor loop. Failures are the caller's to log
/// and drop; implementations never retry.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), SendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_name() {
        assert_eq!(
            ChatTarget::from_name("+19095551234"),
            ChatTarget::Handle("+19095551234".to_string())
        );
        assert_eq!(
            ChatTarget::from_name("alice@example.com"),
            ChatTarget::Handle("alice@example.com".to_string())
        );
        assert_eq!(
            ChatTarget::from_name("Family Chat"),
            ChatTarget::GroupName("Family Chat".to_string())
        );
    }
}
