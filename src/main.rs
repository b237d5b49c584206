//!
//! src/main.rs
//!
//! Terminal client for the music subscription API. Loads configuration,
//! starts the logger and runs the interactive session on stdin/stdout
//!
//!

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tune_sub::{ClientError, config, fetch, logging, session};

#[derive(Parser, Debug)]
#[command(name = "tune-sub")]
#[command(about = "Search the song catalog and manage your subscriptions")]
#[command(version)]
struct Args {
    /// Email of the user whose home page to open
    #[arg(short, long, env = "MUSIC_EMAIL")]
    email: String,

    /// Base URL of the API, overrides MUSIC_API_BASE
    #[arg(short, long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // .env has to be loaded before clap reads MUSIC_EMAIL
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let cfgs = config::load_config(args.base_url.as_deref())?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "tune-sub",
        version = %env!("CARGO_PKG_VERSION"),
        api = %cfgs.api.home_url,
        "starting"
    );

    let client = fetch::HomeClient::new(&cfgs.http, &cfgs.api)?;
    let shutdown = CancellationToken::new();

    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(msg = "interrupted", "session.signal");
                shutdown.cancel();
            }
        })
    };

    let mut session = session::Session::new(Arc::new(client), &args.email, shutdown);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    let result = session.run(stdin, &mut stdout).await;
    trigger.abort();
    info!("exit");
    drop(_guard);

    // the blocking stdin read can't be cancelled, so don't let runtime
    // shutdown wait on it
    std::process::exit(match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    })
}
