use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use pathmark_common::formatter::format_grouped;
use pathmark_common::protocol::{
    CoordinatorRequest, CoordinatorResponse, Notification, PageRequest, TabId,
};
use pathmark_common::record::{LocatorSet, derive_record_id};
use pathmark_engine::config::{ConfigLoader, PathmarkConfig};
use pathmark_engine::coordinator::Coordinator;
use pathmark_engine::dom::Document;
use pathmark_engine::generator::LocatorGenerator;
use pathmark_engine::resolver::Resolver;
use pathmark_engine::selector::css;
use pathmark_engine::store::{JsonFileStore, RecordStore};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pathmark", version, about = "Element locator capture and resolution")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to $PATHMARK_CONFIG, ./pathmark.yaml, then ~/.pathmark/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record store file, overriding the configured path
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate locators for the first element matching a CSS selector
    Locate {
        /// HTML snapshot to read
        html: PathBuf,
        /// CSS selector picking the element to capture
        #[arg(long)]
        select: String,
        /// Page URL used to derive the record id
        #[arg(long)]
        url: Option<String>,
    },
    /// Resolve locators against an HTML snapshot
    Resolve {
        html: PathBuf,
        /// Absolute path locator (XPath)
        #[arg(long = "a")]
        locator_a: Option<String>,
        /// Structural CSS path
        #[arg(long = "b")]
        locator_b: Option<String>,
        /// Short CSS selector
        #[arg(long = "c")]
        locator_c: Option<String>,
        /// Resolve the locators of a stored record and update its counters
        #[arg(long, conflicts_with_all = ["locator_a", "locator_b", "locator_c"])]
        record: Option<String>,
    },
    /// Inspect or edit stored records
    Records {
        #[command(subcommand)]
        action: RecordsAction,
    },
    /// Work with the stored log
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
}

#[derive(Subcommand)]
enum RecordsAction {
    /// Print records grouped by workflow, page, section and subsection
    List,
    /// Delete one record by id
    Delete { id: String },
}

#[derive(Subcommand)]
enum LogsAction {
    /// Write the log as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

type CliCoordinator =
    Coordinator<mpsc::UnboundedSender<Notification>, mpsc::UnboundedSender<(TabId, PageRequest)>>;

/// Coordinator over the JSON store. The receivers are held so the channels
/// stay open for the lifetime of the command.
struct Background {
    coordinator: CliCoordinator,
    _panels: mpsc::UnboundedReceiver<Notification>,
    _tabs: mpsc::UnboundedReceiver<(TabId, PageRequest)>,
}

impl Background {
    fn open(config: &PathmarkConfig) -> anyhow::Result<Self> {
        let store = JsonFileStore::open(&config.store.path).with_context(|| {
            format!("Failed to open record store {}", config.store.path.display())
        })?;
        let (panels_tx, panels_rx) = mpsc::unbounded_channel();
        let (tabs_tx, tabs_rx) = mpsc::unbounded_channel();
        Ok(Self {
            coordinator: Coordinator::new(Box::new(store), panels_tx, tabs_tx, config),
            _panels: panels_rx,
            _tabs: tabs_rx,
        })
    }

    fn request(&mut self, request: CoordinatorRequest) -> anyhow::Result<CoordinatorResponse> {
        Ok(self.coordinator.handle(request)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await?,
    };
    if let Some(store) = args.store {
        config.store.path = store;
    }
    debug!(store = %config.store.path.display(), "Configuration loaded");

    run(args.command, &config)?;
    Ok(())
}

fn run(command: Command, config: &PathmarkConfig) -> anyhow::Result<()> {
    match command {
        Command::Locate { html, select, url } => {
            let doc = read_document(&html)?;
            let node = css::query_selector(&doc, &select)?
                .ok_or_else(|| anyhow!("No element matches '{}'", select))?;
            let mut captured = LocatorGenerator::new(&config.capture).generate(&doc, node);
            if let Some(url) = url {
                captured.id = derive_record_id(&url, &captured.locators.locator_a);
            }
            println!("{}", serde_json::to_string_pretty(&captured)?);
        }
        Command::Resolve {
            html,
            locator_a,
            locator_b,
            locator_c,
            record,
        } => {
            let mut doc = read_document(&html)?;
            let mut resolver = Resolver::new(&config.highlight);
            match record {
                Some(id) => {
                    let mut background = Background::open(config)?;
                    let stored = background
                        .coordinator
                        .store()
                        .get(&id)?
                        .ok_or_else(|| anyhow!("No record with id '{}'", id))?;
                    let results = resolver.resolve_all(&mut doc, &stored.locators);
                    background.request(CoordinatorRequest::UpdateStats {
                        locator_a: stored.locators.locator_a,
                        results: results.clone(),
                    })?;
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
                None => {
                    let locators = LocatorSet {
                        locator_a: locator_a.unwrap_or_default(),
                        locator_b: locator_b.unwrap_or_default(),
                        locator_c: locator_c.unwrap_or_default(),
                    };
                    let results = resolver.resolve_all(&mut doc, &locators);
                    println!("{}", serde_json::to_string_pretty(&results)?);
                }
            }
        }
        Command::Records { action } => {
            let mut background = Background::open(config)?;
            match action {
                RecordsAction::List => match background.request(CoordinatorRequest::LoadRecords)? {
                    CoordinatorResponse::Records { grouped, .. } => {
                        print!("{}", format_grouped(&grouped));
                    }
                    other => bail!("Unexpected response: {:?}", other),
                },
                RecordsAction::Delete { id } => {
                    match background.request(CoordinatorRequest::DeleteData { id })? {
                        CoordinatorResponse::Deleted { id, existed: true } => {
                            println!("Deleted {}", id);
                        }
                        CoordinatorResponse::Deleted { id, existed: false } => {
                            bail!("No record with id '{}'", id);
                        }
                        other => bail!("Unexpected response: {:?}", other),
                    }
                }
            }
        }
        Command::Logs {
            action: LogsAction::Export { out },
        } => {
            let mut background = Background::open(config)?;
            let data = match background.request(CoordinatorRequest::ExportLogs)? {
                CoordinatorResponse::Logs { data } => data,
                other => bail!("Unexpected response: {:?}", other),
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, data)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Logs written to {}", path.display());
                }
                None => println!("{}", data),
            }
        }
    }
    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Document::parse(&html).with_context(|| format!("Failed to parse {}", path.display()))
}
