mod config;
mod events;
mod grid;
mod metrics;
mod net;
mod pending;
mod players;
mod state;
mod tui;
mod workers;

use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use config::ServerConfig;
use events::ServerEvent;
use metrics::{ServerMetricsWriter, ServerPositionsWriter};
use state::ServerState;

#[derive(Parser)]
#[command(name = "gridclash-server")]
#[command(about = "GridClash authoritative server")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(long, default_value_t = gridclash_protocol::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = gridclash_protocol::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(long, default_value_t = gridclash_protocol::HEARTBEAT_INTERVAL_MS)]
    heartbeat_interval: u64,

    #[arg(long, default_value_t = gridclash_protocol::HEARTBEAT_TIMEOUT_MS)]
    heartbeat_timeout: u64,

    #[arg(long, default_value_t = gridclash_protocol::COLOR_TIMEOUT_MS)]
    color_timeout: u64,

    #[arg(long, default_value_t = gridclash_protocol::GAME_OVER_TIMEOUT_MS)]
    game_over_timeout: u64,

    #[arg(long, default_value_t = gridclash_protocol::RETRANSMIT_GRANULARITY_MS)]
    retransmit_granularity: u64,

    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let config = ServerConfig {
        bind: args.bind.clone(),
        port: args.port,
        tick_rate: args.tick_rate,
        heartbeat_interval_ms: args.heartbeat_interval,
        heartbeat_timeout_ms: args.heartbeat_timeout,
        color_timeout_ms: args.color_timeout,
        game_over_timeout_ms: args.game_over_timeout,
        retransmit_granularity_ms: args.retransmit_granularity,
    };

    let socket = UdpSocket::bind(&bind_addr).with_context(|| format!("failed to bind {bind_addr}"))?;
    let state = Arc::new(ServerState::new(config, socket));

    let metrics_writer = ServerMetricsWriter::create("server_metrics.csv").context("opening server_metrics.csv")?;
    let positions_writer = ServerPositionsWriter::create("server_positions.csv").context("opening server_positions.csv")?;

    spawn_workers(state.clone(), metrics_writer, positions_writer);

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("server listening on {}", state.local_addr());
        run_headless(&state)?;
    } else {
        run_with_tui(&state)?;
    }

    Ok(())
}

fn spawn_workers(state: Arc<ServerState>, metrics: ServerMetricsWriter, positions: ServerPositionsWriter) {
    {
        let state = state.clone();
        std::thread::spawn(move || workers::snapshot_broadcaster(state, metrics, positions));
    }
    {
        let state = state.clone();
        std::thread::spawn(move || workers::color_retransmitter(state));
    }
    {
        let state = state.clone();
        std::thread::spawn(move || workers::game_over_retransmitter(state));
    }
    {
        let state = state.clone();
        std::thread::spawn(move || workers::heartbeat_monitor(state));
    }
}

/// Receive loop, run on the main thread exactly as the source's `while True`
/// socket read does.
fn run_headless(state: &Arc<ServerState>) -> Result<()> {
    state.socket.set_read_timeout(Some(Duration::from_millis(500)))?;
    let mut buf = [0u8; 1200];

    while state.is_running() {
        match state.socket.recv_from(&mut buf) {
            Ok((len, from)) => net::handle_packet(state, from, &buf[..len]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut => continue,
            Err(err) => {
                log::warn!("recv_from failed: {err}");
            }
        }

        for event in state.drain_events() {
            log_server_event(event);
        }
    }

    Ok(())
}

fn log_server_event(event: ServerEvent) {
    match event {
        ServerEvent::PlayerJoined { player_id, addr } => log::info!("player {player_id} joined from {addr}"),
        ServerEvent::PlayerReady { player_id } => log::info!("player {player_id} ready"),
        ServerEvent::PlayerLeft { player_id, reason } => log::info!("player {player_id} left: {}", reason.as_str()),
        ServerEvent::CellClaimed { player_id, cell_index } => {
            log::debug!("player {player_id} claimed cell {cell_index}")
        }
        ServerEvent::GameOver { winner_id } => log::info!("game over, winner={winner_id}"),
        ServerEvent::Error { message } => log::error!("{message}"),
    }
}

fn run_with_tui(state: &Arc<ServerState>) -> Result<()> {
    state.socket.set_read_timeout(Some(Duration::from_millis(10)))?;

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let started = Instant::now();
    let mut buf = [0u8; 1200];

    while state.is_running() {
        match state.socket.recv_from(&mut buf) {
            Ok((len, from)) => net::handle_packet(state, from, &buf[..len]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock || err.kind() == io::ErrorKind::TimedOut => {}
            Err(err) => log::warn!("recv_from failed: {err}"),
        }

        // Events are drained purely to keep the queue from growing unbounded;
        // the TUI reads fresh state directly rather than replaying the log.
        let _ = state.drain_events();

        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    state.shutdown();
                }
            }
        }

        let stats = tui::ServerStats::sample(state, started);
        terminal.draw(|frame| tui::render(frame, &stats))?;
    }

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
