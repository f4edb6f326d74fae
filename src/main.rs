use clap::Parser;
use dotenv::dotenv;
use tokio::sync::oneshot;

mod ai;
mod bot;
mod channels;
mod config;
mod contacts;
mod db;
mod picker;
mod utils;

use ai::{OpenAIClient, RetryPolicy};
use bot::{Bot, BotOptions};
use channels::{ChatTarget, IMessageSender};
use config::Config;
use contacts::ContactsBook;
use db::MessagesDb;
use picker::PickerOptions;

#[derive(Parser, Debug)]
#[command(name = "zbot", about = "iMessage GPT bot with Contacts name resolution")]
struct Args {
    /// Filter chats by substring (name/identifier/contact)
    #[arg(long)]
    hint: Option<String>,

    /// Skip the picker and run for this chat id
    #[arg(long)]
    chat_id: Option<i64>,

    /// Resolve 1:1 phone/email identifiers to Contacts names
    #[arg(long)]
    with_contacts: bool,

    /// How many recent chats to show
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env();

    let db = match MessagesDb::open(&config.chat_db_path) {
        Ok(db) => db,
        Err(err) => {
            log::error!(
                "Cannot open message store at {}: {}",
                config.chat_db_path,
                err
            );
            std::process::exit(1);
        }
    };

    let generator = match OpenAIClient::new(&config.api_key, None, &config.model) {
        Ok(client) => client,
        Err(err) => {
            log::error!("Failed to create OpenAI client: {}", err);
            std::process::exit(1);
        }
    };

    let chat_id = match args.chat_id {
        Some(id) => id,
        None => {
            let contacts = if args.with_contacts {
                let book = ContactsBook::load();
                if book.is_empty() {
                    log::warn!("No readable Contacts stores found; identifiers will be shown raw");
                }
                book
            } else {
                ContactsBook::empty()
            };
            let options = PickerOptions {
                hint: args.hint.clone(),
                limit: args.limit.unwrap_or(config.list_limit),
                use_contacts: args.with_contacts,
            };
            match picker::pick_chat(&db, &contacts, &options) {
                Ok((id, label)) => {
                    log::info!("Selected chat_id={} ({})", id, label);
                    id
                }
                Err(picker::PickerError::Aborted) => std::process::exit(0),
                Err(err) => {
                    eprintln!("{}", err);
                    std::process::exit(1);
                }
            }
        }
    };

    let chat_name = match db.chat_name(chat_id) {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => {
            log::error!("chat_id={} has no usable name or identifier", chat_id);
            std::process::exit(1);
        }
        Err(err) => {
            log::error!("chat_id={} not found: {}", chat_id, err);
            std::process::exit(1);
        }
    };
    let target = ChatTarget::from_name(&chat_name);

    let options = BotOptions {
        trigger_prefix: config.trigger_prefix.clone(),
        output_prefix: config.output_prefix.clone(),
        poll_interval: config.poll_interval,
        cooldown: config.cooldown,
        max_context_messages: config.max_context_messages,
        retry: RetryPolicy::default(),
    };

    let mut bot = Bot::new(chat_id, target, db, generator, IMessageSender, options);
    if let Err(err) = bot.initialize() {
        log::error!("Failed to read latest message id: {}", err);
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received");
            let _ = shutdown_tx.send(());
        }
    });

    bot.run(shutdown_rx).await;
}
