//! Status history - append-only status log of a single task, and the clock stamping it

use super::Status;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of status changes, oldest first
///
/// Never empty: a fresh log is seeded with `Status::New`. Consecutive entries
/// never repeat a status and timestamps never go backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredLog")]
pub struct StatusLog {
    entries: Vec<LogEntry>,
}

#[derive(Deserialize)]
struct StoredLog {
    entries: Vec<LogEntry>,
}

impl TryFrom<StoredLog> for StatusLog {
    type Error = String;

    fn try_from(stored: StoredLog) -> Result<Self, Self::Error> {
        if stored.entries.is_empty() {
            return Err("status log has no entries".to_string());
        }
        Ok(Self {
            entries: stored.entries,
        })
    }
}

impl StatusLog {
    /// Create a log seeded with `New` at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entries: vec![LogEntry {
                status: Status::New,
                timestamp: now,
            }],
        }
    }

    /// Current status (the latest entry)
    pub fn status(&self) -> Status {
        self.last().status
    }

    /// Time the current status was entered
    pub fn since(&self) -> DateTime<Utc> {
        self.last().timestamp
    }

    /// How long the current status has been held at `now`
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        (now - self.since()).max(Duration::zero())
    }

    /// Append `status` unless it is already current
    ///
    /// Returns whether an entry was appended. A `now` earlier than the last
    /// entry is clamped to it.
    pub fn record(&mut self, status: Status, now: DateTime<Utc>) -> bool {
        if self.status() == status {
            return false;
        }
        let timestamp = now.max(self.since());
        self.entries.push(LogEntry { status, timestamp });
        true
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a well-formed log
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn last(&self) -> &LogEntry {
        // seeded in `new` and only ever appended to
        &self.entries[self.entries.len() - 1]
    }
}

/// Source of "now" for status log entries
///
/// Pinned to a virtual time while scheduled jobs are replayed so their effects
/// are logged at the scheduled time instead of wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    pinned: Option<DateTime<Utc>>,
}

impl Clock {
    /// Clock following real time
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time: the pinned virtual time if any, else real time
    pub fn now(&self) -> DateTime<Utc> {
        self.pinned.unwrap_or_else(Utc::now)
    }

    /// Pin the clock to a virtual time
    pub fn pin(&mut self, time: DateTime<Utc>) {
        self.pinned = Some(time);
    }

    /// Return to real time
    pub fn unpin(&mut self) {
        self.pinned = None;
    }

    /// Whether a virtual time is pinned
    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap()
    }

    #[test]
    fn test_log_seeded_with_new() {
        let log = StatusLog::new(at(0));
        assert_eq!(log.len(), 1);
        assert_eq!(log.status(), Status::New);
    }

    #[test]
    fn test_record_skips_repeats() {
        let mut log = StatusLog::new(at(0));
        assert!(!log.record(Status::New, at(1)));
        assert!(log.record(Status::Active, at(2)));
        assert!(!log.record(Status::Active, at(3)));
        assert!(log.record(Status::Done, at(4)));
        let statuses: Vec<Status> = log.entries().iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![Status::New, Status::Active, Status::Done]);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut log = StatusLog::new(at(30));
        log.record(Status::Active, at(10));
        assert_eq!(log.since(), at(30));
    }

    #[test]
    fn test_duration() {
        let mut log = StatusLog::new(at(0));
        log.record(Status::Active, at(5));
        assert_eq!(log.duration(at(20)), Duration::minutes(15));
        assert_eq!(log.duration(at(1)), Duration::zero());
    }

    #[test]
    fn test_clock_pin() {
        let mut clock = Clock::new();
        assert!(!clock.is_pinned());
        clock.pin(at(7));
        assert_eq!(clock.now(), at(7));
        clock.unpin();
        assert!(clock.now() > at(7));
    }
}
