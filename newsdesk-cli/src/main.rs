use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use newsdesk_core::{AddFeedRequest, AppConfig, ArticleQuery, DataApi, PreferencesUpdate, ServiceError};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Personal news desk: aggregated feeds, readable articles, trending topics.
#[derive(Debug, Parser)]
#[command(name = "newsdesk", version)]
struct Cli {
    /// Configuration file (defaults to <config dir>/newsdesk/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding preferences.json (defaults to the config directory).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate every feed now, ignoring the cache age.
    Refresh,
    /// List cached articles.
    List(ListArgs),
    /// Article counts and latest headlines per category.
    Categories,
    /// Most frequent topics across the cached headlines.
    Trending,
    /// Top stories per category.
    Digest,
    /// Extract the readable content of a page.
    Extract { url: String },
    /// Archive link for a page (snapshot or submission link).
    ArchiveUrl { url: String },
    #[command(subcommand)]
    Feeds(FeedsCommand),
    #[command(subcommand)]
    Prefs(PrefsCommand),
    /// Read commands from stdin against one long-lived cache.
    Shell,
    /// Mark an article as read, optionally liking some topics.
    Read {
        id: String,
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Dismiss an article and mute some topics.
    NotInterested {
        id: String,
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    category: Option<String>,
    /// Registry key of a single source.
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum FeedsCommand {
    List,
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Remove { key: String },
}

#[derive(Debug, Subcommand)]
enum PrefsCommand {
    Show,
    Set(PrefsSetArgs),
    Clear,
    Stats,
}

#[derive(Debug, Args)]
struct PrefsSetArgs {
    /// Text scale, 1.0 being the normal size.
    #[arg(long, value_parser = parse_text_size)]
    text_size: Option<f32>,
    #[arg(long)]
    reality_mode: Option<bool>,
    #[arg(long)]
    hide_read_mode: Option<bool>,
    /// Replaces the liked topics.
    #[arg(long = "interested", num_args = 0..)]
    interested_topics: Option<Vec<String>>,
    /// Replaces the muted topics.
    #[arg(long = "not-interested", num_args = 0..)]
    not_interested_topics: Option<Vec<String>>,
}

fn parse_text_size(value: &str) -> Result<f32, String> {
    match value.parse::<f32>() {
        Ok(size) if size.is_finite() && size > 0.0 => Ok(size),
        _ => Err(format!("text size must be a positive number, got {value}")),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to initialise Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if is_caller_error(e.as_ref()) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&PathBuf>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_or_init(path),
        None => AppConfig::load(),
    }
}

fn data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| AppConfig::config_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// One line typed into the shell, parsed with the same subcommands.
#[derive(Debug, Parser)]
#[command(no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_ref());
    let api = DataApi::load_from_dir(config, data_dir(cli.data_dir)).await?;

    match cli.command {
        Command::Shell => shell(&api, cli.pretty).await,
        command => execute(&api, command, cli.pretty).await,
    }
}

async fn shell(api: &DataApi, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    info!("shell started; `exit` or end of input quits");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"newsdesk> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words = split_words(&line);
        match words.first().map(String::as_str) {
            None => continue,
            Some("exit" | "quit") => break,
            Some(_) => {}
        }
        match ShellLine::try_parse_from(words) {
            Ok(ShellLine { command: Command::Shell }) => eprintln!("already in the shell"),
            Ok(ShellLine { command }) => {
                if let Err(e) = execute(api, command, pretty).await {
                    eprintln!("error: {e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
    Ok(())
}

/// Splits a shell line on whitespace; double quotes group words.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

async fn execute(api: &DataApi, command: Command, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Shell => Ok(()),
        Command::Refresh => print(&api.force_refresh().await, pretty),
        Command::List(args) => {
            let query = ArticleQuery {
                category: args.category,
                source: args.source,
                search: args.search,
                page: args.page,
                limit: args.limit,
            };
            print(&api.list_articles(&query).await, pretty)
        }
        Command::Categories => print(&api.list_categories().await, pretty),
        Command::Trending => print(&api.trending().await, pretty),
        Command::Digest => print(&api.digest().await, pretty),
        Command::Extract { url } => print(&api.extract(&url).await?, pretty),
        Command::ArchiveUrl { url } => print(&api.archive_url(&url).await?, pretty),
        Command::Feeds(FeedsCommand::List) => print(&api.list_feeds().await, pretty),
        Command::Feeds(FeedsCommand::Add { url, name, category, icon }) => {
            let request = AddFeedRequest {
                url,
                name,
                category,
                icon,
            };
            print(&api.add_feed(request).await?, pretty)
        }
        Command::Feeds(FeedsCommand::Remove { key }) => print(&api.remove_feed(&key).await?, pretty),
        Command::Prefs(PrefsCommand::Show) => print(&api.preferences().await, pretty),
        Command::Prefs(PrefsCommand::Set(args)) => {
            let update = PreferencesUpdate {
                text_size: args.text_size,
                reality_mode: args.reality_mode,
                hide_read_mode: args.hide_read_mode,
                interested_topics: args.interested_topics,
                not_interested_topics: args.not_interested_topics,
            };
            print(&api.update_preferences(update).await, pretty)
        }
        Command::Prefs(PrefsCommand::Clear) => print(&api.clear_preferences().await, pretty),
        Command::Prefs(PrefsCommand::Stats) => print(&api.preference_stats().await, pretty),
        Command::Read { id, topics } => {
            api.mark_read(&id, &topics).await?;
            print(&Ack::ok(id), pretty)
        }
        Command::NotInterested { id, topics } => {
            api.mark_not_interested(&id, &topics).await?;
            print(&Ack::ok(id), pretty)
        }
    }
}

#[derive(Debug, Serialize)]
struct Ack {
    id: String,
    ok: bool,
}

impl Ack {
    fn ok(id: String) -> Self {
        Self { id, ok: true }
    }
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

/// Rejected input exits with 2, anything else with 1.
fn is_caller_error(err: &(dyn std::error::Error + 'static)) -> bool {
    err.downcast_ref::<ServiceError>().is_some()
}
