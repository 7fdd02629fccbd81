use std::fs::File;

use serde::Serialize;

#[derive(Debug, Serialize)]
struct ClientMetricsRow {
    client_id: u16,
    snapshot_id: u32,
    seq_num: u32,
    server_timestamp: u64,
    recv_time: u64,
    latency_ms: u64,
    jitter_ms: u64,
    bandwidth_per_client_kbps: f64,
}

pub struct ClientMetricsWriter {
    writer: csv::Writer<File>,
}

impl ClientMetricsWriter {
    pub fn create(path: &str) -> std::io::Result<Self> {
        let exists = std::path::Path::new(path).exists();
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new().has_headers(!exists).from_writer(file);
        Ok(Self { writer })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write_row(
        &mut self,
        client_id: u16,
        snapshot_id: u32,
        seq_num: u32,
        server_timestamp: u64,
        recv_time: u64,
        latency_ms: u64,
        jitter_ms: u64,
        bandwidth_per_client_kbps: f64,
    ) -> std::io::Result<()> {
        self.writer
            .serialize(ClientMetricsRow {
                client_id,
                snapshot_id,
                seq_num,
                server_timestamp,
                recv_time,
                latency_ms,
                jitter_ms,
                bandwidth_per_client_kbps,
            })
            .map_err(csv_to_io)?;
        self.writer.flush()
    }
}

/// `client_positions.csv`: one row per rendered snapshot. Grid-size-dependent
/// column count, so rows are written by hand like `server_positions.csv`.
pub struct ClientPositionsWriter {
    writer: csv::Writer<File>,
    header_written: bool,
}

impl ClientPositionsWriter {
    pub fn create(path: &str) -> std::io::Result<Self> {
        let exists = std::path::Path::new(path).exists();
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        Ok(Self {
            writer,
            header_written: exists,
        })
    }

    pub fn write_row(&mut self, player_id: u16, timestamp_ms: u64, cells: &[u8]) -> std::io::Result<()> {
        if !self.header_written {
            let mut header = vec!["player_id".to_string(), "timestamp_ms".to_string()];
            header.extend((0..cells.len()).map(|i| format!("cell_{i}")));
            self.writer.write_record(&header).map_err(csv_to_io)?;
            self.header_written = true;
        }

        let mut record = vec![player_id.to_string(), timestamp_ms.to_string()];
        record.extend(cells.iter().map(|c| c.to_string()));
        self.writer.write_record(&record).map_err(csv_to_io)?;
        self.writer.flush()
    }
}

fn csv_to_io(err: csv::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

/// `latency = max(0, recv_time - server_ts)`, clamped per the open question
/// on clock skew (no synchronization step; see DESIGN.md).
pub fn latency_ms(recv_time_ms: u64, server_ts_ms: u64) -> u64 {
    recv_time_ms.saturating_sub(server_ts_ms)
}

/// `jitter = |(recv_time - previous_recv_time) - tick_interval_ms|`, or 0 with no previous sample.
pub fn jitter_ms(recv_time_ms: u64, previous_recv_time_ms: Option<u64>, tick_interval_ms: u64) -> u64 {
    match previous_recv_time_ms {
        None => 0,
        Some(previous) => {
            let delta = recv_time_ms.saturating_sub(previous) as i64;
            (delta - tick_interval_ms as i64).unsigned_abs()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_clamps_at_zero_on_skew() {
        assert_eq!(latency_ms(100, 150), 0);
        assert_eq!(latency_ms(150, 100), 50);
    }

    #[test]
    fn jitter_is_zero_without_a_previous_sample() {
        assert_eq!(jitter_ms(100, None, 50), 0);
    }

    #[test]
    fn jitter_measures_deviation_from_tick_interval() {
        assert_eq!(jitter_ms(200, Some(100), 50), 50);
        assert_eq!(jitter_ms(150, Some(100), 50), 0);
    }
}
