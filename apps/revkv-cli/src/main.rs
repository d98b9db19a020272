use anyhow::{Context, bail, ensure};
use clap::{Args, Parser, Subcommand};
use revkv_common::{
    DeleteOutcome, Entry, GetOutcome, ListOutcome, PutOutcome, Revision, RevisionsOutcome,
    StoreConfig,
};
use revkv_engine::{DynStore, RevisionStore, reply};
use revkv_serial::SerializingProxy;
use revkv_table::MemoryTable;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "revkv-cli", about = "CLI tool for revkv revision stores")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    /// Print entries as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// JSON store config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of the file table
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// File name prefix
    #[arg(short, long)]
    prefix: Option<String>,

    /// Create the directory if it is missing
    #[arg(long)]
    create_dir: bool,

    /// Keep only the newest revision on writes
    #[arg(long)]
    auto_purge: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Store(StoreCommand),
    /// Walk through create, update, conflict and delete on an in-memory store
    Demo,
}

#[derive(Subcommand)]
enum StoreCommand {
    /// Write VALUE as the revision after REV (0 creates the key)
    Put {
        key: String,
        revision: Revision,
        value: String,
    },
    /// Print the newest entry of a key
    Get { key: String },
    /// Remove a key and its whole history
    Delete { key: String },
    /// Print the newest entry of every key
    List,
    /// Print every stored revision of a key
    Revisions { key: String },
}

#[derive(Serialize)]
struct EntryView<'a> {
    key: &'a str,
    revision: Revision,
    body: std::borrow::Cow<'a, str>,
}

impl<'a> From<&'a Entry> for EntryView<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            key: entry.key.as_str(),
            revision: entry.revision,
            body: entry.body_lossy(),
        }
    }
}

struct Printer {
    json: bool,
}

impl Printer {
    fn entries(&self, entries: &[Entry]) -> anyhow::Result<()> {
        if self.json {
            let views: Vec<EntryView<'_>> = entries.iter().map(EntryView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        } else {
            for entry in entries {
                println!("{entry} {}", entry.body_lossy());
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Store(command) => {
            let config = store_config(&cli.store)?;
            let store = DynStore::open(&config).context("opening store")?;
            run(&store, command, &Printer { json: cli.json })
        }
        Commands::Demo => demo(),
    }
}

fn run(store: &DynStore, command: StoreCommand, printer: &Printer) -> anyhow::Result<()> {
    match command {
        StoreCommand::Put {
            key,
            revision,
            value,
        } => match store.put(&key, revision, value) {
            PutOutcome::Created { key, revision } => println!("created {key}@{revision}"),
            PutOutcome::Updated { key, revision } => println!("updated {key}@{revision}"),
            PutOutcome::Conflict {
                key,
                expected,
                actual,
            } => match actual {
                Some(actual) => bail!("conflict on {key}: expected {expected}, current {actual}"),
                None => bail!("conflict on {key}: expected {expected}, key does not exist"),
            },
            PutOutcome::Failure { key, error } => bail!("put {key} failed: {error}"),
        },
        StoreCommand::Get { key } => match store.get(&key) {
            GetOutcome::Found(entry) => printer.entries(std::slice::from_ref(&entry))?,
            GetOutcome::NotFound { key } => println!("{key}: not found"),
            GetOutcome::Failure { key, error } => bail!("get {key} failed: {error}"),
        },
        StoreCommand::Delete { key } => match store.delete(&key) {
            DeleteOutcome::Deleted { key, body } => {
                println!("deleted {key} ({})", String::from_utf8_lossy(&body))
            }
            DeleteOutcome::NotFound { key } => println!("{key}: not found"),
            DeleteOutcome::Failure { key, error } => bail!("delete {key} failed: {error}"),
        },
        StoreCommand::List => match store.list() {
            ListOutcome::Entries(entries) => printer.entries(&entries)?,
            ListOutcome::Failure { error } => bail!("list failed: {error}"),
        },
        StoreCommand::Revisions { key } => match store.get_revisions(&key) {
            RevisionsOutcome::Found { entries, .. } => printer.entries(&entries)?,
            RevisionsOutcome::NotFound { key } => println!("{key}: not found"),
            RevisionsOutcome::Failure { key, error } => bail!("revisions {key} failed: {error}"),
        },
    }
    Ok(())
}

fn store_config(args: &StoreArgs) -> anyhow::Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            StoreConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(dir) = &args.dir {
        config.directory = dir.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.prefix = prefix.clone();
    }
    config.create_dir |= args.create_dir;
    config.auto_purge |= args.auto_purge;
    config.validate()?;
    Ok(config)
}

fn wait<O>(rx: mpsc::Receiver<O>) -> anyhow::Result<O> {
    rx.recv().context("request dropped without an outcome")
}

fn demo() -> anyhow::Result<()> {
    println!("Demo: in-memory store behind a serializing proxy");
    let proxy = SerializingProxy::spawn(RevisionStore::new(MemoryTable::new()))?;

    let (handler, rx) = reply();
    proxy.put("foo", 0, "data", handler);
    let created = wait(rx)?;
    println!("put(foo, 0, data) -> {created:?}");
    ensure!(matches!(created, PutOutcome::Created { revision: 1, .. }), "expected Created(1)");

    let (handler, rx) = reply();
    proxy.get("foo", handler);
    let found = wait(rx)?;
    println!("get(foo) -> {}", describe_get(&found));
    ensure!(
        found.entry().is_some_and(|e| e.revision == 1 && e.body == b"data"),
        "expected Found(1, data)"
    );

    let (handler, rx) = reply();
    proxy.put("foo", 1, "v2", handler);
    let updated = wait(rx)?;
    println!("put(foo, 1, v2) -> {updated:?}");
    ensure!(matches!(updated, PutOutcome::Updated { revision: 2, .. }), "expected Updated(2)");

    let (handler, rx) = reply();
    proxy.put("foo", 1, "v3", handler);
    let conflict = wait(rx)?;
    println!("put(foo, 1, v3) -> {conflict:?}");
    ensure!(
        matches!(
            conflict,
            PutOutcome::Conflict {
                expected: 1,
                actual: Some(2),
                ..
            }
        ),
        "expected Conflict(1, 2)"
    );

    let (handler, rx) = reply();
    proxy.delete("foo", handler);
    let deleted = wait(rx)?;
    println!("delete(foo) -> {deleted:?}");
    ensure!(deleted.body() == Some(&b"v2"[..]), "expected Deleted(v2)");

    let (handler, rx) = reply();
    proxy.get("foo", handler);
    let gone = wait(rx)?;
    println!("get(foo) -> {}", describe_get(&gone));
    ensure!(gone.is_not_found(), "expected NotFound");

    proxy.shutdown();
    println!("Demo: OK");
    Ok(())
}

fn describe_get(outcome: &GetOutcome) -> String {
    match outcome {
        GetOutcome::Found(entry) => format!("Found({}, {})", entry.revision, entry.body_lossy()),
        GetOutcome::NotFound { .. } => "NotFound".to_string(),
        GetOutcome::Failure { error, .. } => format!("Failure({error})"),
    }
}
