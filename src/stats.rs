//! Session statistics.
//!
//! Counters are atomics so producer threads, the driving loop and the CLI can
//! share one instance. Totals can be persisted as JSON across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for one coordinator session.
#[derive(Debug)]
pub struct SessionStats {
    /// Frames handed to consumers
    frames_delivered: AtomicU64,
    /// Waits that returned without data
    waits_timed_out: AtomicU64,
    /// Cross events raised
    cross_events: AtomicU64,
    /// End-of-stream notifications fired
    end_of_stream: AtomicU64,
    /// Completed driving-loop ticks
    ticks: AtomicU64,
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            frames_delivered: AtomicU64::new(0),
            waits_timed_out: AtomicU64::new(0),
            cross_events: AtomicU64::new(0),
            end_of_stream: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Stats that load previous totals from `path` and save back to it.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("could not load previous session stats: {e}");
        }

        stats
    }

    pub fn record_frames(&self, count: u64) {
        self.frames_delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.waits_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cross_event(&self) {
        self.cross_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_end_of_stream(&self) {
        self.end_of_stream.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            waits_timed_out: self.waits_timed_out.load(Ordering::Relaxed),
            cross_events: self.cross_events.load(Ordering::Relaxed),
            end_of_stream: self.end_of_stream.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Ticks: {}\n\
             - Frames delivered: {}\n\
             - Waits timed out: {}\n\
             - Cross events: {}\n\
             - End-of-stream notifications: {}\n\
             - Session duration: {} seconds",
            stats.ticks,
            stats.frames_delivered,
            stats.waits_timed_out,
            stats.cross_events,
            stats.end_of_stream,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk. A no-op without a persistence path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                frames_delivered: stats.frames_delivered,
                waits_timed_out: stats.waits_timed_out,
                cross_events: stats.cross_events,
                end_of_stream: stats.end_of_stream,
                ticks: stats.ticks,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = read_persisted(path)?;
                self.frames_delivered
                    .store(persisted.frames_delivered, Ordering::Relaxed);
                self.waits_timed_out
                    .store(persisted.waits_timed_out, Ordering::Relaxed);
                self.cross_events
                    .store(persisted.cross_events, Ordering::Relaxed);
                self.end_of_stream
                    .store(persisted.end_of_stream, Ordering::Relaxed);
                self.ticks.store(persisted.ticks, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.frames_delivered.store(0, Ordering::Relaxed);
        self.waits_timed_out.store(0, Ordering::Relaxed);
        self.cross_events.store(0, Ordering::Relaxed);
        self.end_of_stream.store(0, Ordering::Relaxed);
        self.ticks.store(0, Ordering::Relaxed);
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_delivered: u64,
    pub waits_timed_out: u64,
    pub cross_events: u64,
    pub end_of_stream: u64,
    pub ticks: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub frames_delivered: u64,
    pub waits_timed_out: u64,
    pub cross_events: u64,
    pub end_of_stream: u64,
    #[serde(default)]
    pub ticks: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read previously persisted totals without creating a live stats instance.
pub fn read_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared session stats.
pub type SharedSessionStats = Arc<SessionStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_counting() {
        let stats = SessionStats::new();
        stats.record_frames(3);
        stats.record_frames(2);
        stats.record_timeout();
        stats.record_cross_event();

        let snap = stats.snapshot();
        assert_eq!(snap.frames_delivered, 5);
        assert_eq!(snap.waits_timed_out, 1);
        assert_eq!(snap.cross_events, 1);
        assert_eq!(snap.end_of_stream, 0);

        stats.reset();
        assert_eq!(stats.snapshot().frames_delivered, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionStats::new().summary();
        assert!(summary.contains("Frames delivered"));
        assert!(summary.contains("Cross events"));
    }

    #[test]
    fn test_stats_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.json");

        let stats = SessionStats::with_persistence(path.clone());
        stats.record_frames(7);
        stats.record_end_of_stream();
        stats.save().unwrap();

        let reloaded = SessionStats::with_persistence(path.clone());
        let snap = reloaded.snapshot();
        assert_eq!(snap.frames_delivered, 7);
        assert_eq!(snap.end_of_stream, 1);
        assert_eq!(read_persisted(&path).unwrap().frames_delivered, 7);
    }
}
