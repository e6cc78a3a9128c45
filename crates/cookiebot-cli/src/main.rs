//! `cookiebot` binary: load the configuration, get a browser session,
//! and hand control to the decision loop.
//!
//! Ctrl-C clears the running flag; the in-flight tick finishes, the loop
//! exits, and the shutdown path writes the last captured save blob before
//! the browser is released.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cookiebot_browser::{launch, GameDriver};
use cookiebot_core::{BotSession, GameClient};
use cookiebot_types::BotConfig;

/// The game page sets its title once the game object is live; give a slow
/// machine a generous window.
const GAME_BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// Title fragment that marks the game as loaded.
const GAME_TITLE_NEEDLE: &str = "cookies";

/// Cookie Clicker automation bot driving a real browser over the Chrome
/// DevTools Protocol.
#[derive(Parser, Debug)]
#[command(name = "cookiebot", version, about)]
struct Cli {
    /// Configuration file (default: config.txt, falling back to
    /// config-sample.txt in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Attach to an existing DevTools page WebSocket instead of launching
    /// a browser (e.g. ws://127.0.0.1:9222/devtools/page/<target>)
    #[arg(long)]
    ws_url: Option<String>,

    /// Launch the browser headless
    #[arg(long)]
    headless: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (config_path, config) = match &cli.config {
        Some(path) => (path.clone(), BotConfig::from_file(path)?),
        None => BotConfig::discover(Path::new("."))?,
    };
    tracing::info!(path = %config_path.display(), "configuration loaded");

    // Get a page target: attach when given one, otherwise spawn our own
    // browser pointed at the game. The handle must stay alive for the
    // whole run; dropping it kills the child.
    let mut chrome = None;
    let ws_url = match &cli.ws_url {
        Some(url) => url.clone(),
        None => {
            let handle =
                launch::launch(config.binary_path(), Some(config.url()), cli.headless).await?;
            let ws_url = handle.ws_url.clone();
            chrome = Some(handle);
            ws_url
        }
    };

    let driver = GameDriver::connect(&ws_url).await?;
    if cli.ws_url.is_some() {
        // Attached sessions may be sitting on any page; a launched browser
        // already opened the game URL as its first tab.
        driver.navigate(config.url()).await?;
    }
    driver
        .wait_for_title_contains(GAME_TITLE_NEEDLE, GAME_BOOT_TIMEOUT)
        .await?;

    // Cooperative stop: Ctrl-C clears the flag, the loop notices at the
    // next tick boundary.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping after the current tick");
                running.store(false, Ordering::Relaxed);
            }
        });
    }

    let mut session = BotSession::new(GameClient::new(driver), config, running);
    let outcome = match session.prepare().await {
        Ok(()) => session.run().await,
        Err(e) => Err(e),
    };

    // The shutdown path runs no matter how the loop ended.
    let shutdown_outcome = session.shutdown().await;
    drop(chrome);

    outcome?;
    shutdown_outcome?;
    Ok(())
}
