//! Run report

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// How one session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Ok,
    Error(String),
    /// The run was cancelled before the session got a permit
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "ok"),
            Outcome::Error(message) => write!(f, "error: {}", message),
            Outcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub index: usize,
    pub endpoint: String,
    pub outcome: Outcome,
}

impl SessionRecord {
    pub fn new(index: usize, endpoint: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            index,
            endpoint: endpoint.into(),
            outcome,
        }
    }
}

/// Records of a finished run, sorted by index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub records: Vec<SessionRecord>,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Ok))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Error(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Cancelled))
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| predicate(&r.outcome)).count()
    }

    /// Whether indices `0..session_count` each appear exactly once
    pub fn covers(&self, session_count: usize) -> bool {
        self.records.len() == session_count
            && self.records.iter().enumerate().all(|(i, r)| r.index == i)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "#{} {}: {}", record.index, record.endpoint, record.outcome)?;
        }
        write!(
            f,
            "{} ok, {} failed, {} cancelled",
            self.succeeded(),
            self.failed(),
            self.cancelled()
        )
    }
}

/// Append-only record collection shared by the session tasks
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    records: Arc<Mutex<Vec<SessionRecord>>>,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: SessionRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot of the records, sorted by index
    pub fn report(&self) -> RunReport {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        records.sort_by_key(|r| r.index);
        RunReport { records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_sorted_and_counted() {
        let collector = ReportCollector::new();
        collector.append(SessionRecord::new(2, "b", Outcome::Cancelled));
        collector.append(SessionRecord::new(0, "a", Outcome::Ok));
        collector.append(SessionRecord::new(1, "c", Outcome::Error("0x0E".into())));

        let report = collector.report();
        assert!(report.covers(3));
        assert!(!report.covers(4));
        assert_eq!(report.records[1].endpoint, "c");
        assert_eq!((report.succeeded(), report.failed(), report.cancelled()), (1, 1, 1));
        assert!(report.to_string().ends_with("1 ok, 1 failed, 1 cancelled"));
    }
}
