//! An interactive terminal client for clinical note generation.

#[macro_use]
extern crate tracing;

mod storage;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;

use clinote_core::conversation::Message;
use clinote_core::exchange::{
    Credential, ExchangeBuilder, ExchangeController,
};
use clinote_core::sections;
use clinote_core::storage::Storage;
use clinote_core::store::{
    ConversationDefaults, ConversationStore, ConversationUpdate,
};
use clinote_model::ModelDescriptor;
use clinote_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};

use storage::JsonDirStorage;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };

    let mut config = OpenAIConfigBuilder::with_api_key(&api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    let provider = OpenAIProvider::new(config.build());

    let defaults = match env::var("CLINOTE_MODEL") {
        Ok(id) => ConversationDefaults {
            model: Some(ModelDescriptor::new(id.clone(), id, 24000, 8000)),
            ..Default::default()
        },
        Err(_) => ConversationDefaults::default(),
    };

    let data_dir = data_dir();
    let storage = match JsonDirStorage::new(&data_dir) {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!(
                "failed to open data directory {}: {err}",
                data_dir.display()
            );
            return;
        }
    };
    let mut store = ConversationStore::load(storage, defaults);
    if store.is_empty() {
        store.create_conversation();
    }

    let mut controller = ExchangeBuilder::with_provider(provider, store)
        .with_credential(Credential::UserSupplied(api_key))
        .with_sign_off(env::var("CLINOTE_SIGN_OFF").unwrap_or_default())
        .on_loading(|loading| {
            if loading {
                eprintln!("{}", "generating...".dimmed());
            }
        })
        .build();

    print_help();
    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            ":quit" | ":q" => break,
            ":help" => print_help(),
            ":new" => {
                let conversation =
                    controller.store_mut().create_conversation();
                println!("started {}", conversation.name.bold());
            }
            ":list" => list_conversations(controller.store()),
            ":open" => open_conversation(&mut controller, rest),
            ":name" => {
                let id = controller.store().selected().map(|c| c.id);
                match id {
                    Some(id) if !rest.is_empty() => {
                        controller.store_mut().update_conversation(
                            &id,
                            ConversationUpdate::Name(rest.to_string()),
                        );
                    }
                    _ => eprintln!("usage: :name <new name>"),
                }
            }
            ":prompt" => {
                let id = controller.store().selected().map(|c| c.id);
                match id {
                    Some(id) => {
                        controller.store_mut().update_conversation(
                            &id,
                            ConversationUpdate::Prompt(rest.to_string()),
                        );
                    }
                    None => eprintln!("no note is open"),
                }
            }
            ":delete" => {
                let id = controller.store().selected().map(|c| c.id);
                match id {
                    Some(id) => {
                        controller.store_mut().delete_conversation(&id);
                        println!("deleted");
                    }
                    None => eprintln!("no note is open"),
                }
            }
            ":search" => {
                for conversation in controller.store().search(rest) {
                    println!(
                        "{} ({} messages)",
                        conversation.name,
                        conversation.messages.len()
                    );
                }
            }
            ":regen" => match controller.regenerate().await {
                Some(Ok(conversation)) => {
                    if let Some(message) =
                        conversation.last_assistant_message()
                    {
                        print_reply(&message.content);
                    }
                }
                Some(Err(err)) => {
                    eprintln!("{}", err.to_string().bright_red());
                }
                None => eprintln!("nothing to regenerate yet"),
            },
            _ if line.starts_with(':') => {
                eprintln!("unknown command: {command}");
            }
            _ => match controller.send(Message::user(line), 0).await {
                Ok(conversation) => {
                    if let Some(message) =
                        conversation.last_assistant_message()
                    {
                        print_reply(&message.content);
                    }
                }
                Err(err) => {
                    eprintln!("{}", err.to_string().bright_red());
                }
            },
        }
    }
}

fn print_help() {
    println!(
        "commands: :new, :list, :open <n>, :name <text>, :prompt <text>, \
         :search <term>, :regen, :delete, :help, :quit"
    );
    println!("anything else is sent as a transcript message");
}

fn list_conversations<S: Storage>(store: &ConversationStore<S>) {
    let selected = store.selected().map(|c| c.id);
    for (index, conversation) in store.conversations().enumerate() {
        let marker = if Some(conversation.id) == selected { "*" } else { " " };
        println!(
            "{marker} [{index}] {} ({} messages)",
            conversation.name,
            conversation.messages.len()
        );
    }
}

fn open_conversation<S: Storage>(
    controller: &mut ExchangeController<S>,
    arg: &str,
) {
    let id = arg.parse::<usize>().ok().and_then(|index| {
        controller.store().conversations().nth(index).map(|c| c.id)
    });
    match id {
        Some(id) => {
            controller.store_mut().select(&id);
            let name = &controller.store().selected().unwrap().name;
            println!("opened {}", name.bold());
        }
        None => eprintln!("usage: :open <index from :list>"),
    }
}

fn print_reply(content: &str) {
    let parsed = sections::extract_sections(content);
    print_section("Potential Transcription Errors", &parsed.potential_issues);
    print_section("Helpful Content", &parsed.helpful_content);
    print_section("Clinical Document", &parsed.document);
    println!();
}

fn print_section(title: &str, body: &str) {
    println!("\n{}", title.bright_cyan().bold());
    for line in body.lines() {
        println!("{}{}", BAR_CHAR.bright_cyan(), line.bright_white());
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("CLINOTE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clinote")
}
