mod config;
mod metrics;
mod net;
mod session;
mod state;
mod workers;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::ClientConfig;
use session::ClientSession;

/// Headless GridClash client: performs the handshake, keeps the connection
/// alive, and accepts `row col` clicks from stdin. Stands in for the actual
/// renderer, which is out of scope here.
#[derive(Parser)]
#[command(name = "gridclash-client")]
#[command(about = "GridClash headless client")]
struct Args {
    #[arg(long, default_value_t = format!("127.0.0.1:{}", gridclash_protocol::DEFAULT_PORT))]
    server: String,

    #[arg(long, default_value_t = gridclash_protocol::EVENT_TIMEOUT_MS)]
    event_timeout: u64,

    #[arg(long, default_value_t = gridclash_protocol::EVENT_MAX_RETRIES)]
    event_max_retries: u32,

    #[arg(long, default_value_t = gridclash_protocol::CLIENT_SNAPSHOT_QUEUE_MAX)]
    snapshot_queue_max: usize,

    #[arg(long, default_value_t = gridclash_protocol::CLIENT_METRICS_LOG_EVERY)]
    metrics_log_every: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ClientConfig {
        server_addr: args.server,
        event_timeout_ms: args.event_timeout,
        event_max_retries: args.event_max_retries,
        snapshot_queue_max: args.snapshot_queue_max,
        metrics_log_every: args.metrics_log_every,
    };

    log::info!("connecting to {}", config.server_addr);
    let session = Arc::new(ClientSession::connect(config).context("handshake failed")?);
    log::info!("connected as player {}", session.player_id);

    spawn_workers(session.clone());

    println!("Connected as player {}. Type \"<row> <col>\" to claim a cell, \"quit\" to exit.", session.player_id);
    run_stdin_loop(&session);

    session.shutdown();
    std::thread::sleep(Duration::from_millis(250));
    Ok(())
}

fn spawn_workers(session: Arc<ClientSession>) {
    {
        let session = session.clone();
        std::thread::spawn(move || net::receive_loop(&session));
    }
    {
        let session = session.clone();
        std::thread::spawn(move || workers::event_retransmitter(&session));
    }
    {
        let session = session.clone();
        std::thread::spawn(move || workers::heartbeat_emitter(&session));
    }
    std::thread::spawn(move || summary_printer(session));
}

/// Periodically prints a one-line grid summary, the renderer stand-in's
/// only feedback loop beyond the prompt itself.
fn summary_printer(session: Arc<ClientSession>) {
    while session.is_running() {
        std::thread::sleep(Duration::from_secs(2));
        if let Some(snapshot) = session.observables.latest_snapshot() {
            let claimed = snapshot.grid.iter().filter(|&&c| c != 0).count();
            println!(
                "[snapshot {}] {}/{} cells claimed, pending clicks: {:?}",
                snapshot.snapshot_id,
                claimed,
                snapshot.grid.len(),
                session.pending_events.lock().unwrap().pending_cells()
            );
        }
        if let Some(err) = session.observables.take_error() {
            eprintln!("error: {err}");
        }
        if session.game_over.load(std::sync::atomic::Ordering::SeqCst) {
            println!("game over");
            session.shutdown();
        }
    }
}

fn run_stdin_loop(session: &Arc<ClientSession>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if !session.is_running() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("stdin read failed: {err}");
                break;
            }
        };

        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let mut parts = line.split_whitespace();
        let row = parts.next().and_then(|p| p.parse::<u16>().ok());
        let col = parts.next().and_then(|p| p.parse::<u16>().ok());

        match (row, col) {
            (Some(row), Some(col)) if row < session.grid_size as u16 && col < session.grid_size as u16 => {
                net::submit_click(session, row, col);
            }
            _ => println!("usage: <row> <col>, both in [0, {})", session.grid_size),
        }
    }
}
