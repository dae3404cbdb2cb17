//! Terminal front end for the diagnosis chat.
//!
//! Plain lines are sent as questions. `/chip N` fills the input with a
//! suggestion, `/send` submits it, `/image PATH` uploads a leaf photo and
//! `/lang es|en` switches language.

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use app_lib::chat::ConversationEvent;
use app_lib::db::settings_repo;
use app_lib::i18n::ChatStrings;
use app_lib::models::message::{Message, Sender};
use app_lib::models::settings::Language;
use app_lib::state::AppState;

#[derive(Debug, PartialEq)]
enum Command {
    Ask(String),
    Chip(usize),
    Send,
    Image(PathBuf),
    Lang(Language),
    Help,
    Quit,
}

fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Ask(line.to_string())));
    };

    let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
    let arg = arg.trim();
    let command = match name {
        "chip" => {
            let n: usize = arg.parse().map_err(|_| format!("/chip needs a number, got '{arg}'"))?;
            // Chips are shown 1-based.
            Command::Chip(n.checked_sub(1).ok_or("chips start at 1")?)
        }
        "send" => Command::Send,
        "image" if !arg.is_empty() => Command::Image(PathBuf::from(arg)),
        "image" => return Err("/image needs a file path".into()),
        "lang" => Command::Lang(arg.parse().map_err(|e| format!("{e}"))?),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command /{other}")),
    };
    Ok(Some(command))
}

fn render(message: &Message, strings: &ChatStrings) -> String {
    let who = match message.sender {
        Sender::User => strings.user_label,
        Sender::Assistant => strings.assistant_label,
    };
    let mut out = format!("[{}] {}: {}", message.timestamp, who, message.text);
    if message.image_attachment.is_some() {
        out.push_str(" [photo]");
    }
    if message.is_diagnostic {
        out.push_str(" [diagnosis]");
    }
    out
}

fn print_help(strings: &ChatStrings) {
    println!("{}", strings.disclaimer);
    for (i, chip) in strings.suggestions.iter().enumerate() {
        println!("  /chip {}  {}", i + 1, chip);
    }
    println!("  /send  /image PATH  /lang es|en  /quit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let state = AppState::initialize().context("failed to start the chat")?;
    let conversation = state.conversation.clone();

    println!("== {} ==", conversation.strings().title);
    for message in conversation.messages() {
        println!("{}", render(&message, conversation.strings()));
    }
    print_help(conversation.strings());

    let mut events = conversation.subscribe();
    let printer = conversation.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConversationEvent::MessageAppended(message)) => {
                    println!("{}", render(&message, printer.strings()));
                }
                Ok(ConversationEvent::ComposingChanged { composing: true }) => {
                    println!("... {}", printer.strings().analyzing);
                }
                Ok(ConversationEvent::ComposingChanged { composing: false }) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        match command {
            Command::Ask(text) => {
                conversation.submit_text(&text).await;
            }
            Command::Chip(index) => match conversation.select_suggestion(index) {
                Ok(chip) => println!("> {chip}   (/send to ask)"),
                Err(e) => eprintln!("{e}"),
            },
            Command::Send => {
                if !conversation.submit_input().await {
                    eprintln!("nothing to send");
                }
            }
            Command::Image(path) => {
                conversation.upload_image_file(&path).await;
            }
            Command::Lang(language) => {
                {
                    let db = state
                        .db
                        .lock()
                        .map_err(|e| anyhow::anyhow!("settings store poisoned: {e}"))?;
                    settings_repo::save_language(&db, language)?;
                }
                conversation.set_language(language);
                print_help(conversation.strings());
            }
            Command::Help => print_help(conversation.strings()),
            Command::Quit => break,
        }
    }

    Ok(())
}
