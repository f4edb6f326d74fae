//! The monitor loop: polls the message store, detects trigger messages,
//! and drives context assembly, generation, and delivery.

pub mod context;

use crate::ai::{ResponseGenerator, RetryPolicy, generate_with_retry};
use crate::channels::{ChatTarget, MessageSender};
use crate::db::{MessageStore, StoreError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    Evaluating,
    Responding,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct BotOptions {
    pub trigger_prefix: String,
    pub output_prefix: String,
    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub max_context_messages: usize,
    pub retry: RetryPolicy,
}

/// One monitored conversation. All mutable loop state (marker, cooldown,
/// state tag) lives here; nothing is global and nothing survives the
/// process.
pub struct Bot<S, G, D>
where
    S: MessageStore,
    G: ResponseGenerator,
    D: MessageSender,
{
    chat_id: i64,
    target: ChatTarget,
    store: S,
    generator: G,
    sender: D,
    options: BotOptions,
    state: LoopState,
    /// Highest message id already considered. Monotone; ids at or below
    /// it are never evaluated again.
    last_seen_id: i64,
    last_response_at: Option<Instant>,
}

impl<S, G, D> Bot<S, G, D>
where
    S: MessageStore,
    G: ResponseGenerator,
    D: MessageSender,
{
    pub fn new(
        chat_id: i64,
        target: ChatTarget,
        store: S,
        generator: G,
        sender: D,
        options: BotOptions,
    ) -> Self {
        Self {
            chat_id,
            target,
            store,
            generator,
            sender,
            options,
            state: LoopState::Idle,
            last_seen_id: 0,
            last_response_at: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn last_seen_id(&self) -> i64 {
        self.last_seen_id
    }

    /// Anchor the marker to the newest existing message so only messages
    /// arriving after startup are ever answered.
    pub fn initialize(&mut self) -> Result<(), StoreError> {
        match self.store.latest_message_id(self.chat_id)? {
            Some(id) => {
                self.last_seen_id = id;
                log::info!(
                    "Initialized last_seen_id={} (won't respond to old messages)",
                    id
                );
            }
            None => log::info!("No existing messages in chat"),
        }
        Ok(())
    }

    /// Poll-sleep cycle until the shutdown signal fires. The signal is
    /// only observed at tick boundaries, never mid-dispatch.
    pub async fn run(&mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        log::info!(
            "Bot running for chat_id={} target={:?}",
            self.chat_id,
            self.target
        );
        log::info!("Trigger prefix: {}", self.options.trigger_prefix);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    self.state = LoopState::Stopped;
                    log::info!("Shutdown signal received, stopping.");
                    return;
                }
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
            self.tick().await;
        }
    }

    /// One poll cycle: fetch everything past the marker and evaluate each
    /// message in id order.
    pub async fn tick(&mut self) {
        self.state = LoopState::Polling;
        let batch = match self.store.messages_since(self.chat_id, self.last_seen_id) {
            Ok(batch) => batch,
            Err(err) => {
                log::warn!("Store query failed, skipping tick: {}", err);
                self.state = LoopState::Idle;
                return;
            }
        };

        for msg in batch {
            self.state = LoopState::Evaluating;
            log::debug!(
                "New message chat_id={} msg_id={} from={:?} from_me={} at={} text_len={}",
                msg.chat_id,
                msg.id,
                msg.sender,
                msg.is_from_me,
                msg.timestamp,
                msg.text.len()
            );
            // Marker moves first so a later error can't cause a replay.
            self.last_seen_id = msg.id;

            if msg.is_from_me {
                continue;
            }
            let Some(prompt) = extract_prompt(&msg.text, &self.options.trigger_prefix) else {
                continue;
            };
            if prompt.is_empty() {
                log::debug!("Trigger with empty prompt ignored (msg_id={})", msg.id);
                continue;
            }
            if !self.cooldown_elapsed() {
                log::info!("Cooldown active, dropping trigger msg_id={}", msg.id);
                continue;
            }

            log::info!("Incoming trigger msg_id={}: {:?}", msg.id, prompt);
            self.respond(msg.id, &prompt).await;
        }

        self.state = LoopState::Idle;
    }

    fn cooldown_elapsed(&self) -> bool {
        match self.last_response_at {
            None => true,
            Some(at) => at.elapsed() >= self.options.cooldown,
        }
    }

    async fn respond(&mut self, trigger_id: i64, prompt: &str) {
        self.state = LoopState::Responding;

        let messages = match context::build_context(
            &self.store,
            self.chat_id,
            trigger_id,
            prompt,
            self.options.max_context_messages,
        ) {
            Ok(messages) => messages,
            Err(err) => {
                log::warn!("Context build failed, reply dropped: {}", err);
                return;
            }
        };

        let reply = match generate_with_retry(&self.generator, &self.options.retry, &messages).await
        {
            Ok(reply) => reply,
            Err(err) => {
                // Cooldown untouched: a failed generation must not block
                // the next eligible trigger.
                log::error!("Generation failed, no reply sent: {}", err);
                return;
            }
        };

        log::info!("Outgoing reply ({} chars)", reply.len());
        self.last_response_at = Some(Instant::now());

        let outgoing = format!("{}{}", self.options.output_prefix, reply);
        if let Err(err) = self.sender.send(&self.target, &outgoing).await {
            log::warn!("Send failed, reply dropped: {}", err);
        }
    }
}

/// Case-sensitive trigger match. Returns the message body with the prefix
/// and any immediately following whitespace removed, or `None` when the
/// message doesn't start with the prefix.
pub fn extract_prompt(text: &str, trigger_prefix: &str) -> Option<String> {
    let rest = text.strip_prefix(trigger_prefix)?;
    Some(rest.trim_start().to_string())
}
