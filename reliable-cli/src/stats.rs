//! Statistics display and formatting
//!
//! The poll loop publishes a snapshot of every live session's counters to a
//! [`StatsBoard`]; a reporter thread reads the board on its own interval and
//! logs one line per peer, so reporting never stalls packet handling.

use parking_lot::Mutex;
use reliable_protocol::SessionStats;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Share of sent packets that were retransmissions, in percent
pub fn retransmit_ratio(stats: &SessionStats) -> f64 {
    let total = stats.packets_sent + stats.packets_retransmitted;
    if total == 0 {
        0.0
    } else {
        stats.packets_retransmitted as f64 * 100.0 / total as f64
    }
}

/// One-line summary of a session's counters
pub fn format_session_stats(peer: &str, stats: &SessionStats) -> String {
    let dropped = stats.corrupt_dropped + stats.malformed_dropped;
    format!(
        "{} | sent {} in {} pkts ({:.1}% rtx) | delivered {} | acks {}/{} | dup {} | oow {} | dropped {}",
        peer,
        format_bytes(stats.bytes_sent),
        stats.packets_sent,
        retransmit_ratio(stats),
        format_bytes(stats.bytes_delivered),
        stats.acks_sent,
        stats.acks_received,
        stats.duplicates,
        stats.out_of_window,
        dropped,
    )
}

/// Latest counters for every live session, shared with the reporter thread
#[derive(Debug, Clone, Default)]
pub struct StatsBoard {
    inner: Arc<Mutex<BTreeMap<String, SessionStats>>>,
}

impl StatsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `peer`
    pub fn publish(&self, peer: &str, stats: &SessionStats) {
        let mut board = self.inner.lock();
        match board.get_mut(peer) {
            Some(entry) => entry.clone_from(stats),
            None => {
                board.insert(peer.to_string(), stats.clone());
            }
        }
    }

    pub fn remove(&self, peer: &str) {
        self.inner.lock().remove(peer);
    }

    /// Copy of every entry, ordered by peer
    pub fn snapshot(&self) -> Vec<(String, SessionStats)> {
        self.inner
            .lock()
            .iter()
            .map(|(peer, stats)| (peer.clone(), stats.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Log every entry at `interval` on a background thread
    pub fn spawn_reporter(&self, interval: Duration) -> std::io::Result<JoinHandle<()>> {
        let board = self.clone();
        let started = Instant::now();
        thread::Builder::new()
            .name("stats-reporter".into())
            .spawn(move || loop {
                thread::sleep(interval);
                let entries = board.snapshot();
                tracing::info!(
                    uptime = %format_duration(started.elapsed()),
                    sessions = entries.len(),
                    "statistics"
                );
                for (peer, stats) in &entries {
                    tracing::info!("{}", format_session_stats(peer, stats));
                }
            })
    }
}
