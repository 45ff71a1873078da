use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use pagepulse_core::{
    load_script, AppConfig, Dom, Element, Mutation, PageLayout, PagePulseError, Session,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> pagepulse_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            layout,
            script,
            config,
            until_ms,
            json,
        } => run_simulate(&layout, &script, config.as_ref(), until_ms, json),
        Commands::Typing {
            roles,
            duration_ms,
            config,
        } => run_typing(roles, duration_ms, config.as_ref()),
        Commands::Config { format, config } => run_config(format, config.as_ref()),
    }
}

/// One mutation stamped with the virtual time at which it was observed.
#[derive(Debug, Serialize)]
struct TimedMutation {
    at_ms: u64,
    #[serde(flatten)]
    mutation: Mutation,
}

fn run_simulate(
    layout: &PathBuf,
    script: &PathBuf,
    config: Option<&PathBuf>,
    until_ms: Option<u64>,
    json: bool,
) -> pagepulse_core::Result<()> {
    tracing::info!(?layout, ?script, "running simulation");

    let config = AppConfig::load_or_default(config.map(PathBuf::as_path))?;
    let layout = PageLayout::load(layout)?;
    let script = load_script(script)?;
    let mut session = Session::from_layout(layout, config)?;

    let mut log = Vec::new();
    collect(&mut session, &mut log);
    session.replay_with(&script, |session| collect(session, &mut log));

    let last_event = script.last().map(|step| step.at_ms).unwrap_or(0);
    let end = until_ms.unwrap_or(last_event + 1000).max(last_event);
    session.advance_to(Duration::from_millis(end));
    collect(&mut session, &mut log);

    tracing::info!(
        events = script.len(),
        mutations = log.len(),
        end_ms = end,
        "simulation finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        for entry in &log {
            println!("{:>8}ms  {}", entry.at_ms, entry.mutation);
        }
    }
    Ok(())
}

fn collect(session: &mut Session, log: &mut Vec<TimedMutation>) {
    let at_ms = session.now().as_millis() as u64;
    log.extend(
        session
            .take_mutations()
            .into_iter()
            .map(|mutation| TimedMutation { at_ms, mutation }),
    );
}

fn run_typing(
    roles: Vec<String>,
    duration_ms: u64,
    config: Option<&PathBuf>,
) -> pagepulse_core::Result<()> {
    let mut config = AppConfig::load_or_default(config.map(PathBuf::as_path))?;
    if !roles.is_empty() {
        config.typing.roles = roles;
    }
    if config.typing.roles.is_empty() {
        return Err(PagePulseError::msg("at least one role is required"));
    }
    tracing::info!(roles = config.typing.roles.len(), duration_ms, "previewing typing rotation");

    let mut dom = Dom::new();
    dom.insert(Element::new(config.targets.typing.as_str(), "span"));
    let mut session = Session::start(dom, config)?;

    let mut previous = String::new();
    let mut elapsed = 0;
    while elapsed <= duration_ms {
        session.advance_to(Duration::from_millis(elapsed));
        for mutation in session.take_mutations() {
            if let Mutation::TextSet { text, .. } = mutation {
                if text != previous {
                    println!("{elapsed:>8}ms  |{text}|");
                    previous = text;
                }
            }
        }
        elapsed += 10;
    }
    Ok(())
}

fn run_config(format: ConfigFormat, config: Option<&PathBuf>) -> pagepulse_core::Result<()> {
    let config = AppConfig::load_or_default(config.map(PathBuf::as_path))?;
    let rendered = match format {
        ConfigFormat::Toml => config.to_toml()?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };
    println!("{rendered}");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless driver for the PagePulse UI engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a scripted event trace against a page layout and print the
    /// resulting document mutations.
    Simulate {
        /// Page layout (JSON) with the initial viewport and elements.
        layout: PathBuf,
        /// Event script (JSON array of `{ "at_ms", "event" }`).
        script: PathBuf,
        /// Optional configuration file (TOML, or JSON by extension).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Virtual time to run until; defaults to one second past the last event.
        #[arg(long)]
        until_ms: Option<u64>,
        /// Print mutations as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the typed-text rotation as it would render over time.
    Typing {
        /// Role strings to rotate through; overrides the configured roles.
        #[arg(short, long = "role")]
        roles: Vec<String>,
        /// How much virtual time to preview.
        #[arg(long, default_value_t = 10_000)]
        duration_ms: u64,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config {
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Toml,
    Json,
}
