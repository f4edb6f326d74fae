//! Delivery into Messages.app via `osascript`.

use super::{ChatTarget, MessageSender, SendError};
use async_trait::async_trait;
use tokio::process::Command;

pub struct IMessageSender;

/// Escape a string for interpolation into an AppleScript literal.
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn chat_script(chat_name: &str, text: &str) -> String {
    let safe_name = escape_applescript(chat_name);
    let safe_text = escape_applescript(text);
    format!(
        r#"
        tell application "Messages"
            set targetChat to first chat whose name is "{safe_name}"
            send "{safe_text}" to targetChat
        end tell
        "#
    )
}

fn handle_script(handle: &str, text: &str) -> String {
    let safe_handle = escape_applescript(handle);
    let safe_text = escape_applescript(text);
    format!(
        r#"
        tell application "Messages"
            set theText to "{safe_text}"

            -- try iMessage
            try
                set svc to first service whose service type = iMessage
                set b to buddy "{safe_handle}" of svc
                send theText to b
                return "sent_imessage"
            end try

            -- fallback to SMS (some Macs expose this as "SMS")
            try
                set svc2 to first service whose service type = SMS
                set b2 to buddy "{safe_handle}" of svc2
                send theText to b2
                return "sent_sms"
            end try

            error "No valid service/buddy for {safe_handle}"
        end tell
        "#
    )
}

async fn run_osascript(script: &str) -> Result<(), SendError> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .await
        .map_err(|e| SendError(format!("failed to run osascript: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(SendError(stderr));
    }
    Ok(())
}

#[async_trait]
impl MessageSender for IMessageSender {
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), SendError> {
        let script = match target {
            ChatTarget::GroupName(name) => chat_script(name, text),
            ChatTarget::Handle(handle) => handle_script(handle, text),
        };
        run_osascript(&script).await
    }
}
