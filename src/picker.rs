//! Interactive chat selection. Pure presentation: reads the chat list,
//! prints labeled rows, returns the chosen chat id.

use std::io::{self, BufRead, Write};
use thiserror::Error;

use crate::contacts::ContactsBook;
use crate::db::{MessageStore, MessagesDb, StoreError};

/// How many chats to scan before filtering down to the displayed list.
const SCAN_LIMIT: usize = 3000;

#[derive(Debug, Error)]
pub enum PickerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no recent chats matched, try a different --hint")]
    NoMatches,
    #[error("selection aborted")]
    Aborted,
    #[error("could not read selection: {0}")]
    Io(#[from] io::Error),
}

pub struct PickerOptions {
    pub hint: Option<String>,
    pub limit: usize,
    pub use_contacts: bool,
}

pub fn pick_chat(
    db: &MessagesDb,
    contacts: &ContactsBook,
    options: &PickerOptions,
) -> Result<(i64, String), PickerError> {
    let chats = db.fetch_chats(SCAN_LIMIT)?;
    let hint = options
        .hint
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let mut filtered: Vec<(i64, i64, String)> = Vec::new();
    for chat in &chats {
        let label = if options.use_contacts {
            contacts.format_chat_label(&chat.display_name, &chat.identifier)
        } else if !chat.display_name.is_empty() {
            chat.display_name.clone()
        } else if !chat.identifier.is_empty() {
            chat.identifier.clone()
        } else {
            "(Unknown)".to_string()
        };

        if !hint.is_empty() {
            let haystacks = [&chat.display_name, &chat.identifier, &label];
            if !haystacks.iter().any(|s| s.to_lowercase().contains(&hint)) {
                continue;
            }
        }

        let last_msg_id = db.latest_message_id(chat.chat_id)?.unwrap_or(0);
        filtered.push((last_msg_id, chat.chat_id, label));
    }

    if filtered.is_empty() {
        return Err(PickerError::NoMatches);
    }

    // Most recently active first.
    filtered.sort_by(|a, b| b.0.cmp(&a.0));
    filtered.truncate(options.limit);

    println!("\nChoose a recent chat:\n");
    for (i, (msg_id, chat_id, label)) in filtered.iter().enumerate() {
        println!(
            "{:2}) chat_id={:<6} last_msg={:<10}  name={}",
            i + 1,
            chat_id,
            msg_id,
            label
        );
    }

    let stdin = io::stdin();
    loop {
        print!("\nEnter 1-{} (or 'q' to quit): ", filtered.len());
        io::stdout().flush()?;

        let mut choice = String::new();
        stdin.lock().read_line(&mut choice)?;
        let choice = choice.trim();

        if matches!(choice.to_lowercase().as_str(), "q" | "quit" | "exit") {
            return Err(PickerError::Aborted);
        }

        match choice.parse::<usize>() {
            Ok(idx) if (1..=filtered.len()).contains(&idx) => {
                let (_, chat_id, label) = &filtered[idx - 1];
                return Ok((*chat_id, label.clone()));
            }
            Ok(_) => println!("Out of range."),
            Err(_) => println!("Please enter a number."),
        }
    }
}
