use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;

mod catalog;
mod config;
mod error;
mod selector;
mod tmux;

use config::Settings;
use error::Error;
use selector::{Selection, Selector};
use tmux::{inside_tmux, Materializer, Multiplexer, SessionRequest, TmuxClient};

/// Pick a project directory or running tmux session and jump into it
#[derive(Debug, Parser)]
#[command(name = "sessionizer", version, about)]
struct Cli {
    /// Load configuration from FILE instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Leave sessions that already have a client out of the list
    #[arg(long)]
    hide_attached: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run(cli).await
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    check_dependencies()?;

    let config = config::load(cli.config.as_deref())?;
    let home = dirs::home_dir().context("could not determine home directory")?;
    let settings = Settings::new(config, cli.hide_attached, home);

    let tmux = TmuxClient::new();
    let live = tmux.list_sessions().await;
    let candidates = catalog::resolve(&settings, &live);
    info!(
        "{} live sessions, {} candidates",
        live.len(),
        candidates.len()
    );

    let labels: Vec<String> = candidates.iter().map(|c| c.label.clone()).collect();
    let request = match Selector::fzf().prompt(&labels).await? {
        Selection::Cancelled => {
            info!("selection cancelled");
            return Ok(());
        }
        Selection::NewQuery(query) => {
            match SessionRequest::from_query(&query, settings.home.clone()) {
                Some(request) => {
                    info!("new session {:?} from query {query:?}", request.name);
                    request
                }
                None => {
                    info!("nothing selected");
                    return Ok(());
                }
            }
        }
        Selection::Chosen { index, label } => {
            let candidate = candidates.get(index).ok_or_else(|| {
                Error::Protocol(format!("selected index {index} ({label:?}) is out of range"))
            })?;
            info!("selected {}", candidate.label);
            candidate.request()
        }
    };

    let materializer = Materializer::new(&tmux);
    let session = materializer.ensure_session(&request, &live).await?;
    materializer.activate(&session, inside_tmux()).await;

    Ok(())
}

/// Both external programs must be on PATH before anything else happens.
fn check_dependencies() -> error::Result<()> {
    for program in ["tmux", "fzf"] {
        which::which(program).map_err(|_| Error::DependencyMissing { program })?;
    }
    Ok(())
}
