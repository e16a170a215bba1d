//! OpenKimi chat - terminal front end
//!
//! Reads lines from stdin and drives a [`ChatClient`]. Plain lines are sent
//! as messages; lines starting with `/` are commands.

use openkimi_client::api::{HttpServiceApi, LoggingApi, ServiceApi};
use openkimi_client::augment::FileUpload;
use openkimi_client::config::{ClientConfig, JsonFileStore, KeyValueStore, MemoryStore};
use openkimi_client::session::{MessageId, Role};
use openkimi_client::ChatClient;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /search <query>     search the web without sending a message
  /upload <path>...   upload and ingest documents
  /deep on|off        extended reasoning
  /web on|off         web search before each message
  /url <address>      switch service address
  /health             probe the service
  /reset              start a new conversation
  /quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openkimi_client=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();

    let store: Arc<dyn KeyValueStore> = match JsonFileStore::open(&config.state_path) {
        Ok(store) => {
            tracing::info!(path = %store.path().display(), "Settings loaded");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Settings unavailable; changes will not be saved");
            Arc::new(MemoryStore::new())
        }
    };

    let http: Arc<dyn ServiceApi> = Arc::new(HttpServiceApi::new(config.initial_base_url(store.as_ref()))?);
    let api: Arc<dyn ServiceApi> = Arc::new(LoggingApi::new(http));
    let client = ChatClient::new(api, store, &config);

    let status = client.start().await;
    println!("OpenKimi at {} - {status}", client.base_url());
    let suggestions = client.session().read(|s| s.suggestions().to_vec());
    if !suggestions.is_empty() {
        println!("Try:");
        for suggestion in &suggestions {
            println!("  - {suggestion}");
        }
    }
    println!("Type /help for commands.");

    let mut printed = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !run_command(&client, line).await {
            break;
        }
        printed = print_new_messages(&client, printed);
    }

    Ok(())
}

/// Handle one input line. Returns false when the user quits.
async fn run_command(client: &ChatClient, line: &str) -> bool {
    let (command, arg) = match line.strip_prefix('/') {
        Some(rest) => rest.split_once(' ').map_or((rest, ""), |(c, a)| (c, a.trim())),
        None => {
            client.set_input(line);
            if let Err(e) = client.submit().await {
                println!("! {e}");
            }
            return true;
        }
    };

    match command {
        "quit" | "exit" => return false,
        "help" => println!("{HELP}"),
        "search" => {
            client.set_input(arg);
            if let Err(e) = client.search().await {
                println!("! {e}");
            }
        }
        "upload" => {
            let mut files = Vec::new();
            for path in arg.split_whitespace() {
                match FileUpload::from_path(Path::new(path)).await {
                    Ok(file) => files.push(file),
                    Err(e) => println!("! cannot read {path}: {e}"),
                }
            }
            client.select_files(files);
            if let Err(e) = client.upload_selected().await {
                println!("! {e}");
            }
        }
        "deep" => match parse_switch(arg) {
            Some(on) => client.set_extended_reasoning(on),
            None => println!("! usage: /deep on|off"),
        },
        "web" => match parse_switch(arg) {
            Some(on) => client.set_web_search(on),
            None => println!("! usage: /web on|off"),
        },
        "url" if !arg.is_empty() => {
            let status = client.set_service_url(arg).await;
            println!("{} - {status}", client.base_url());
        }
        "health" => println!("{}", client.check_health().await),
        "reset" => {
            client.reset().await;
            println!("(new conversation)");
        }
        _ => println!("! unknown command; try /help"),
    }
    true
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Print history entries newer than `after`, returning the newest id seen
fn print_new_messages(client: &ChatClient, after: Option<MessageId>) -> Option<MessageId> {
    client.session().read(|s| {
        let mut last = after;
        for message in s.history().iter().filter(|m| Some(m.id) > after) {
            let label = match message.role {
                Role::User => "you",
                Role::Assistant => "kimi",
                Role::System => "system",
            };
            println!("[{label}] {}", message.content);
            last = Some(message.id);
        }
        last
    })
}
