use std::collections::HashMap;
use std::fs::File;

use serde::Serialize;
use sysinfo::System;

/// Per-player byte counters accumulated between one-second CSV flushes.
#[derive(Debug, Default)]
pub struct BandwidthTracker {
    sent: HashMap<u16, u64>,
    recv: HashMap<u16, u64>,
}

impl BandwidthTracker {
    pub fn add_sent(&mut self, player_id: u16, bytes: usize) {
        *self.sent.entry(player_id).or_insert(0) += bytes as u64;
    }

    pub fn add_recv(&mut self, player_id: u16, bytes: usize) {
        *self.recv.entry(player_id).or_insert(0) += bytes as u64;
    }

    /// Drains the counters, returning `(player_id, sent_kbps, recv_kbps)` for
    /// every player with traffic this window.
    pub fn drain_kbps(&mut self) -> Vec<(u16, f64, f64)> {
        let mut ids: Vec<u16> = self.sent.keys().chain(self.recv.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = ids
            .into_iter()
            .map(|pid| {
                let sent_bits = self.sent.get(&pid).copied().unwrap_or(0) * 8;
                let recv_bits = self.recv.get(&pid).copied().unwrap_or(0) * 8;
                (pid, sent_bits as f64 / 1000.0, recv_bits as f64 / 1000.0)
            })
            .collect();

        self.sent.clear();
        self.recv.clear();
        rows
    }
}

#[derive(Debug, Serialize)]
struct ServerMetricsRow {
    timestamp: u64,
    cpu_percent: f32,
    player_id: u16,
    sent_kbps: f64,
    recv_kbps: f64,
}

/// Append-only `server_metrics.csv` writer, opened once and reused — unlike
/// the original, which reopens the file every second (see DESIGN.md).
pub struct ServerMetricsWriter {
    writer: csv::Writer<File>,
    system: System,
}

impl ServerMetricsWriter {
    pub fn create(path: &str) -> std::io::Result<Self> {
        let exists = std::path::Path::new(path).exists();
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new().has_headers(!exists).from_writer(file);
        Ok(Self {
            writer,
            system: System::new(),
        })
    }

    pub fn write_tick(&mut self, timestamp: u64, rows: &[(u16, f64, f64)]) -> std::io::Result<()> {
        self.system.refresh_cpu_usage();
        let cpu_percent = self.system.global_cpu_usage();

        for &(player_id, sent_kbps, recv_kbps) in rows {
            self.writer
                .serialize(ServerMetricsRow {
                    timestamp,
                    cpu_percent,
                    player_id,
                    sent_kbps,
                    recv_kbps,
                })
                .map_err(csv_to_io)?;
        }
        self.writer.flush()
    }
}

/// `server_positions.csv` has a grid-size-dependent column count
/// (`cell_0..cell_{W*W-1}`), so rows are written as plain records rather than
/// through `#[derive(Serialize)]`.
pub struct ServerPositionsWriter {
    writer: csv::Writer<File>,
    header_written: bool,
}

impl ServerPositionsWriter {
    pub fn create(path: &str) -> std::io::Result<Self> {
        let exists = std::path::Path::new(path).exists();
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        Ok(Self {
            writer,
            header_written: exists,
        })
    }

    pub fn write_row(&mut self, snapshot_id: u32, timestamp_ms: u64, cells: &[u8]) -> std::io::Result<()> {
        if !self.header_written {
            let mut header = vec!["snapshot_id".to_string(), "timestamp_ms".to_string()];
            header.extend((0..cells.len()).map(|i| format!("cell_{i}")));
            self.writer.write_record(&header).map_err(csv_to_io)?;
            self.header_written = true;
        }

        let mut record = vec![snapshot_id.to_string(), timestamp_ms.to_string()];
        record.extend(cells.iter().map(|c| c.to_string()));
        self.writer.write_record(&record).map_err(csv_to_io)?;
        self.writer.flush()
    }
}

fn csv_to_io(err: csv::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_tracker_drains_and_resets() {
        let mut tracker = BandwidthTracker::default();
        tracker.add_sent(1, 1000);
        tracker.add_recv(1, 500);
        let rows = tracker.drain_kbps();
        assert_eq!(rows, vec![(1, 8.0, 4.0)]);
        assert!(tracker.drain_kbps().is_empty());
    }
}
