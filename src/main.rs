//! gitpulse — AI-assisted auto-commit daemon.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use cli::args::{Cli, Command};
use gitpulse::ai::anthropic::AnthropicTransport;
use gitpulse::ai::AiClient;
use gitpulse::config::{self, Config};
use gitpulse::constants;
use gitpulse::dashboard;
use gitpulse::engine::Engine;
use gitpulse::env::Env;
use gitpulse::pid;
use gitpulse::ui::Logger;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let dir = absolutize(cli.target_dir())?;

    match cli.command {
        None => run_daemon(dir).await,
        Some(Command::Init { .. }) => run_init(dir),
        Some(Command::Push) => run_push(dir),
        Some(Command::Dashboard { port }) => run_dashboard(dir, port).await,
    }
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    std::path::absolute(&path).with_context(|| format!("invalid path: {}", path.display()))
}

/// Daemon mode: watch the tree, flush on ENTER / signal / safety timer.
async fn run_daemon(dir: PathBuf) -> Result<()> {
    let config = Config::load_from_dir(&dir, Some(&dir), &Env::real())
        .context("failed to load config")?;

    let logger = Arc::new(Logger::new());
    logger.info(format!(
        "GitPulse starting: path={}, branch={}",
        config.watch_path.display(),
        config.branch
    ));

    let transport = AnthropicTransport::new(
        config.ai.api_key.clone().unwrap_or_default(),
        config.ai.model.clone(),
    );
    let mut engine = Engine::new(config, Arc::clone(&logger), AiClient::new(Arc::new(transport)))
        .context("failed to initialize engine")?;

    // An operator is at this terminal.
    engine.interactive = true;

    // Single stdin reader for the whole process; the main loop and the
    // review prompts drain this one channel sequentially.
    let (stdin_tx, stdin_rx) = mpsc::channel::<String>(8);
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if stdin_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    // The PID file lets `gitpulse push` find this process.
    pid::write(&dir).context("failed to write PID file")?;
    let result = engine.run(stdin_rx).await;
    pid::remove(&dir);

    result.map_err(Into::into)
}

/// `gitpulse init [path]`: write default config, extend .gitignore.
fn run_init(dir: PathBuf) -> Result<()> {
    let created = config::Config::write_default(&dir).context("failed to create config")?;

    let gitignore = dir.join(".gitignore");
    if config::append_gitignore_entries(
        &gitignore,
        &[&format!("{}/", constants::STATE_DIR), constants::PID_FILENAME],
    ) {
        println!("  Updated {}", gitignore.display());
    }

    println!("GitPulse initialized in {}", dir.display());
    println!("  Config: {}", created.display());
    println!("  Run: cd {} && gitpulse", dir.display());
    println!("  Or: gitpulse -C {}", dir.display());
    Ok(())
}

/// `gitpulse push [-C path]`: signal the running daemon to flush.
fn run_push(dir: PathBuf) -> Result<()> {
    let daemon_pid = pid::read(&dir)?;
    kill(Pid::from_raw(daemon_pid), Signal::SIGUSR1)
        .with_context(|| format!("failed to signal daemon (PID {daemon_pid})"))?;
    println!("Sent push signal to GitPulse daemon (PID {daemon_pid})");
    Ok(())
}

/// `gitpulse dashboard [-C path] [--port N]`: read-only history server.
async fn run_dashboard(dir: PathBuf, port: u16) -> Result<()> {
    let history_path = dir
        .join(constants::STATE_DIR)
        .join(constants::HISTORY_FILENAME);
    dashboard::serve(port, history_path)
        .await
        .map_err(Into::into)
}
