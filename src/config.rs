use std::env;
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const MODEL: &str = "ZBOT_MODEL";
    pub const CHAT_DB: &str = "ZBOT_CHAT_DB";
    pub const TRIGGER_PREFIX: &str = "ZBOT_TRIGGER_PREFIX";
    pub const OUTPUT_PREFIX: &str = "ZBOT_OUTPUT_PREFIX";
    pub const POLL_SECONDS: &str = "ZBOT_POLL_SECONDS";
    pub const COOLDOWN_SECONDS: &str = "ZBOT_COOLDOWN_SECONDS";
    pub const MAX_CONTEXT_MESSAGES: &str = "ZBOT_MAX_CONTEXT_MESSAGES";
    pub const LIST_LIMIT: &str = "ZBOT_LIST_LIMIT";
}

/// Default values
pub mod defaults {
    pub const MODEL: &str = "gpt-4o-mini";
    pub const CHAT_DB: &str = "~/Library/Messages/chat.db";
    pub const TRIGGER_PREFIX: &str = "@zbot";
    pub const OUTPUT_PREFIX: &str = "\u{1F916} ";
    pub const POLL_SECONDS: u64 = 2;
    pub const COOLDOWN_SECONDS: u64 = 6;
    pub const MAX_CONTEXT_MESSAGES: usize = 20;
    pub const LIST_LIMIT: usize = 30;
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub chat_db_path: String,
    pub trigger_prefix: String,
    pub output_prefix: String,
    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub max_context_messages: usize,
    pub list_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = env::var(env_vars::OPENAI_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .expect("Missing OPENAI_API_KEY. Set it then re-run: export OPENAI_API_KEY='sk-proj-...'");

        Self {
            api_key,
            model: string_or(env_vars::MODEL, defaults::MODEL),
            chat_db_path: expand_home(&string_or(env_vars::CHAT_DB, defaults::CHAT_DB)),
            trigger_prefix: string_or(env_vars::TRIGGER_PREFIX, defaults::TRIGGER_PREFIX),
            output_prefix: string_or(env_vars::OUTPUT_PREFIX, defaults::OUTPUT_PREFIX),
            poll_interval: Duration::from_secs(number_or(
                env_vars::POLL_SECONDS,
                defaults::POLL_SECONDS,
            )),
            cooldown: Duration::from_secs(number_or(
                env_vars::COOLDOWN_SECONDS,
                defaults::COOLDOWN_SECONDS,
            )),
            max_context_messages: number_or(
                env_vars::MAX_CONTEXT_MESSAGES,
                defaults::MAX_CONTEXT_MESSAGES as u64,
            ) as usize,
            list_limit: number_or(env_vars::LIST_LIMIT, defaults::LIST_LIMIT as u64) as usize,
        }
    }
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn number_or(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid number", name)),
        Err(_) => default,
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return format!("{}/{}", home.trim_end_matches('/'), rest);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let home = env::var("HOME").unwrap();
        assert_eq!(
            expand_home("~/Library/Messages/chat.db"),
            format!("{}/Library/Messages/chat.db", home.trim_end_matches('/'))
        );
        assert_eq!(expand_home("/tmp/chat.db"), "/tmp/chat.db");
    }
}
