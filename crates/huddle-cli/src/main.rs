//! huddle - calendar assistant driven by text messages

mod config;
mod store;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use huddle_agent::{
    DateTimeResolver, InMemoryCalendar, Orchestrator, StaticRoster, ToolRegistry, register_calendar_tools,
};
use huddle_ai::providers::anthropic::AnthropicProvider;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::store::FileConversationStore;

/// huddle - calendar assistant
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Sender identity (phone number)
    #[arg(short, long, default_value = "+15550001")]
    identity: String,

    /// Handle a single message and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Pretend the current time is this RFC 3339 timestamp
    #[arg(long)]
    now: Option<String>,

    /// Config file path (overrides HUDDLE_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

fn init_tracing(verbose: bool, config: &Config) {
    let filter = if verbose {
        EnvFilter::new("huddle=debug,huddle_agent=debug,huddle_ai=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                config
                    .log_filter
                    .as_deref()
                    .unwrap_or("huddle=info,huddle_agent=info,huddle_ai=info"),
            )
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_now(value: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("invalid --now '{}': {}", value, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(Config::config_path);

    // Initialize config and exit
    if args.init_config {
        match Config::init(&config_path) {
            Ok(()) => {
                println!("Config file created at: {}", config_path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = Config::load_from(&config_path);
    init_tracing(args.verbose, &cfg);

    let Some(api_key) = cfg.api_key() else {
        eprintln!("Error: No Anthropic API key found");
        eprintln!();
        eprintln!("Options:");
        eprintln!("  1. Set API key: export ANTHROPIC_API_KEY=your-key");
        eprintln!("  2. Add to config: huddle --init-config, then edit {}", config_path.display());
        std::process::exit(1);
    };

    let fixed_now = args.now.as_deref().map(parse_now).transpose()?;

    let mut provider = AnthropicProvider::new(api_key).with_timeout(Duration::from_secs(cfg.request_timeout_secs))?;
    if let Some(base_url) = &cfg.base_url {
        provider = provider.with_base_url(base_url);
    }

    let data_dir = cfg.data_dir();
    let calendar_path = data_dir.join("calendar.json");
    let calendar = Arc::new(store::load_calendar(&calendar_path)?);
    let conversations = Arc::new(FileConversationStore::new(data_dir.join("conversations")));
    let roster = Arc::new(StaticRoster::new(cfg.roster_members()));
    let resolver = DateTimeResolver::new(cfg.resolver_settings()?);

    let registry = Arc::new(ToolRegistry::new());
    register_calendar_tools(&registry, calendar.clone(), roster.clone(), resolver);

    let orchestrator = Orchestrator::new(
        Arc::new(provider),
        registry,
        conversations,
        roster,
        resolver,
        cfg.orchestrator_config(),
    );

    tracing::debug!(
        model = %cfg.model,
        data_dir = %data_dir.display(),
        contacts = cfg.roster.len(),
        "huddle ready"
    );

    if let Some(message) = args.message {
        let now = fixed_now.unwrap_or_else(Utc::now);
        let reply = orchestrator.process(&message, &args.identity, now).await;
        save_snapshot(&calendar_path, &calendar);
        println!("{}", reply);
        return Ok(());
    }

    run_interactive(&orchestrator, &args.identity, fixed_now, &calendar_path, &calendar).await
}

async fn run_interactive(
    orchestrator: &Orchestrator,
    identity: &str,
    fixed_now: Option<DateTime<Utc>>,
    calendar_path: &std::path::Path,
    calendar: &InMemoryCalendar,
) -> anyhow::Result<()> {
    let tty = io::IsTerminal::is_terminal(&io::stdin());
    if tty {
        eprintln!("huddle ({})", identity);
        eprintln!();
    }

    loop {
        if tty {
            print!("> ");
            io::stdout().flush()?;
        }

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let now = fixed_now.unwrap_or_else(Utc::now);
        let reply = orchestrator.process(input, identity, now).await;
        save_snapshot(calendar_path, calendar);
        println!("{}", reply);
    }

    Ok(())
}

fn save_snapshot(path: &std::path::Path, calendar: &InMemoryCalendar) {
    if let Err(e) = store::save_calendar(path, calendar) {
        tracing::error!(path = %path.display(), error = %e, "failed to save calendar");
    }
}
