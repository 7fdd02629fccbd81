use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;

use crate::state::ServerState;

pub struct ServerStats {
    pub uptime_secs: u64,
    pub snapshot_id: u32,
    pub connected_players: usize,
    pub grid_fill_percent: f64,
    pub scores: Vec<(u8, u16)>,
}

impl ServerStats {
    pub fn sample(state: &ServerState, started: std::time::Instant) -> Self {
        let grid = state.grid_lock.lock().unwrap();
        let filled = grid.as_bytes().iter().filter(|&&c| c != 0).count();
        let grid_fill_percent = 100.0 * filled as f64 / grid.as_bytes().len() as f64;
        let scores = grid.tally();
        drop(grid);

        Self {
            uptime_secs: started.elapsed().as_secs(),
            snapshot_id: state.next_snapshot_id.load(std::sync::atomic::Ordering::SeqCst),
            connected_players: state.players.lock().unwrap().len(),
            grid_fill_percent,
            scores,
        }
    }
}

pub fn render(frame: &mut Frame, stats: &ServerStats) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_fill(frame, chunks[1], stats);
    render_scores(frame, chunks[2], stats);
    render_help(frame, chunks[3]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let block = Block::default()
        .title(format!(" GridClash Server - Uptime: {uptime} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Snapshot: {}  |  Players: {}",
        stats.snapshot_id, stats.connected_players
    );

    let paragraph = Paragraph::new(text).block(block).style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_fill(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Grid ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio((stats.grid_fill_percent / 100.0).clamp(0.0, 1.0))
        .label(format!("{:.1}% claimed", stats.grid_fill_percent));

    frame.render_widget(gauge, area);
}

fn render_scores(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Scores ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let lines: Vec<Line> = stats
        .scores
        .iter()
        .map(|(pid, score)| {
            Line::from(vec![
                Span::styled(format!("player {pid}: "), Style::default().fg(Color::Gray)),
                Span::styled(format!("{score} cells"), Style::default().fg(Color::White)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to quit")
        .block(block)
        .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC));

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{hours:02}:{mins:02}:{secs:02}")
}
