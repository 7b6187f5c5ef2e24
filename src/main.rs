//! Apiary - headless workspace shell
//!
//! Architecture:
//! - Input loop - reads commands from stdin and turns them into intents
//! - App Layer - owns the tree, tabs and collections file
//! - Network Layer (Tokio) - async HTTP execution
//!
//! Notifications are printed to stdout, one per line.

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use apiary::constants::{APP_NAME, APP_VERSION};
use apiary::messages::{ExecutionOutcome, Intent, NetworkEvent, Notification};
use apiary::models::{HttpMethod, RequestBody, RequestDescriptor};
use apiary::network::ExecutionEngine;
use apiary::settings::Settings;
use apiary::storage::{ImportMode, Storage};
use apiary::tabs::TabHandle;
use apiary::{logging, AppActor, AppState};

const HELP: &str = "\
commands:
  mkcol <name> [parent]            create a collection
  mkreq <name> [parent]            create a request
  rename <path> <new-name>         rename a node
  move <path> [target]             move a node (no target = top level)
  rm <path>                        delete a node and its subtree
  open <path>                      open a request in a tab
  new [name]                       open a draft tab
  set <tab> <METHOD> <url> [json]  replace the tab's request
  save <tab>                       save the tab
  saveas <tab> <name> [parent]     save the tab as a new request
  close <tab>                      close a tab
  discard <tab>                    close a tab, dropping edits
  send <tab>                       execute the tab's request
  stop <tab>                       cancel the running execution
  import <file> [replace]          import a collections document
  retry                            retry the last failed save
  quit";

fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config = Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, APP_VERSION);
                std::process::exit(0);
            }
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = parse_args()?;
    let settings = Settings::load(config.as_deref())?;
    let _guard = logging::init(&settings.log_file)?;
    tracing::info!(
        version = APP_VERSION,
        workspace = %settings.workspace_dir.display(),
        strategy = ?settings.cancel_strategy,
        "{} starting",
        APP_NAME
    );

    let state = AppState::open(Storage::new(&settings.collections_file))
        .context("opening the collections file")?;

    // Create channels
    let (intent_tx, intent_rx) = mpsc::unbounded_channel::<Intent>();
    let (net_tx, net_rx) = mpsc::unbounded_channel::<NetworkEvent>();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Notification>();

    // Spawn network and app actors
    let engine = ExecutionEngine::spawn(settings.cancel_strategy, settings.request_timeout, net_tx);
    let app = tokio::spawn(AppActor::new(state, engine, notify_tx).run(intent_rx, net_rx));

    let printer = tokio::spawn(async move {
        while let Some(note) = notify_rx.recv().await {
            println!("{}", render(&note));
        }
    });

    println!("{} {} - type 'help' for commands", APP_NAME, APP_VERSION);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            println!("{}", HELP);
            continue;
        }
        match parse_command(line) {
            Ok(intent) => {
                let quit = matches!(intent, Intent::Quit);
                if intent_tx.send(intent).is_err() || quit {
                    break;
                }
            }
            Err(message) => println!("error: {}", message),
        }
    }

    let _ = intent_tx.send(Intent::Quit);
    app.await?;
    printer.await?;
    tracing::info!("{} stopped", APP_NAME);
    Ok(())
}

fn parse_tab(arg: Option<&str>) -> Result<TabHandle, String> {
    let raw = arg.ok_or("missing tab")?;
    raw.trim_start_matches('#')
        .parse()
        .map(TabHandle::from_raw)
        .map_err(|_| format!("'{}' is not a tab", raw))
}

fn required<'a>(arg: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    arg.ok_or_else(|| format!("missing {}", what))
}

/// Turns one input line into an intent
fn parse_command(line: &str) -> Result<Intent, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let owned = |s: Option<&str>| s.map(str::to_string);

    let intent = match command {
        "mkcol" => Intent::CreateCollection {
            name: required(words.next(), "name")?.to_string(),
            parent: owned(words.next()),
        },
        "mkreq" => Intent::CreateRequest {
            name: required(words.next(), "name")?.to_string(),
            parent: owned(words.next()),
            descriptor: None,
        },
        "rename" => Intent::Rename {
            path: required(words.next(), "path")?.to_string(),
            new_name: required(words.next(), "new name")?.to_string(),
        },
        "move" => Intent::Move {
            source: required(words.next(), "path")?.to_string(),
            target_parent: owned(words.next()),
        },
        "rm" => Intent::Delete {
            path: required(words.next(), "path")?.to_string(),
        },
        "open" => Intent::OpenTab {
            path: required(words.next(), "path")?.to_string(),
        },
        "new" => Intent::NewDraft {
            name: owned(words.next()),
        },
        "set" => {
            let tab = parse_tab(words.next())?;
            let method: HttpMethod = required(words.next(), "method")?.parse()?;
            let mut descriptor = RequestDescriptor::new(method, required(words.next(), "url")?);
            let body = words.collect::<Vec<_>>().join(" ");
            if !body.is_empty() {
                descriptor.body = RequestBody::json(body);
            }
            Intent::EditTab { tab, descriptor }
        }
        "save" => Intent::SaveTab {
            tab: parse_tab(words.next())?,
        },
        "saveas" => Intent::SaveDraftAs {
            tab: parse_tab(words.next())?,
            name: required(words.next(), "name")?.to_string(),
            parent: owned(words.next()),
        },
        "close" => Intent::CloseTab {
            tab: parse_tab(words.next())?,
        },
        "discard" => Intent::ConfirmClose {
            tab: parse_tab(words.next())?,
        },
        "send" => Intent::Send {
            tab: parse_tab(words.next())?,
        },
        "stop" => Intent::Stop {
            tab: parse_tab(words.next())?,
        },
        "import" => Intent::Import {
            path: PathBuf::from(required(words.next(), "file")?),
            mode: match words.next() {
                Some("replace") => ImportMode::Replace,
                Some("merge") | None => ImportMode::Merge,
                Some(other) => return Err(format!("unknown import mode '{}'", other)),
            },
        },
        "retry" => Intent::RetrySave,
        "quit" | "exit" => Intent::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(intent)
}

/// One-line rendering of a notification
fn render(note: &Notification) -> String {
    match note {
        Notification::TreeChanged { old_path, new_path } => match (old_path, new_path) {
            (None, Some(new)) => format!("+ {}", new),
            (Some(old), None) => format!("- {}", old),
            (Some(old), Some(new)) => format!("~ {} -> {}", old, new),
            (None, None) => String::from("~ tree reloaded"),
        },
        Notification::TabOpened { tab, title } => format!("tab {} opened: {}", tab, title),
        Notification::TabTitleChanged { tab, title } => format!("tab {} is now {}", tab, title),
        Notification::TabClosed { tab } => format!("tab {} closed", tab),
        Notification::CloseNeedsConfirmation { tab } => {
            format!("tab {} has unsaved edits; 'discard {}' to close anyway", tab, tab)
        }
        Notification::ExecutionStarted { execution, .. } => format!("{} sending", execution),
        Notification::ExecutionFinished { execution, outcome, .. } => match outcome {
            ExecutionOutcome::Completed(response) => format!(
                "{} {} {} ({} ms)\n{}",
                execution, response.status, response.status_text, response.elapsed_ms, response.body
            ),
            ExecutionOutcome::Failed { message, elapsed_ms } => {
                format!("{} failed after {} ms: {}", execution, elapsed_ms, message)
            }
            ExecutionOutcome::Cancelled => format!("{} cancelled", execution),
        },
        Notification::Saved { requests_written } => format!("saved ({} requests)", requests_written),
        Notification::SaveFailed { message } => format!("save failed: {} ('retry' to try again)", message),
        Notification::Rejected { intent, message } => format!("{} rejected: {}", intent, message),
    }
}
