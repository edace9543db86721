//! history.rs: bounded in-memory log of finished runs for the status endpoint.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::{RunReport, RunResult, Trigger};

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub trigger: Trigger,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items_found: usize,
    pub analyzed: usize,
    pub no_new: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct RunHistory {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl RunHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, r: &RunReport) {
        let (mut analyzed, mut no_new, mut failed) = (0, 0, 0);
        for s in &r.results {
            match s.result {
                RunResult::Analyzed { .. } => analyzed += 1,
                RunResult::NoNewItems => no_new += 1,
                RunResult::Failed { .. } => failed += 1,
            }
        }
        let entry = HistoryEntry {
            trigger: r.trigger,
            target: r.target.clone(),
            started_at: r.started_at,
            finished_at: r.finished_at,
            items_found: r.items_found(),
            analyzed,
            no_new,
            failed,
        };

        let mut v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SourceResult;

    fn report(n: usize) -> RunReport {
        RunReport {
            target: "t".into(),
            trigger: Trigger::Timer,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: vec![
                SourceResult {
                    source: "a".into(),
                    result: RunResult::Analyzed {
                        items_found: n,
                        summary: Some("s".into()),
                        segments_sent: 1,
                        segments_failed: 0,
                    },
                },
                SourceResult {
                    source: "b".into(),
                    result: RunResult::Failed {
                        reason: "x".into(),
                    },
                },
            ],
        }
    }

    #[test]
    fn keeps_only_the_newest_entries() {
        let h = RunHistory::with_capacity(2);
        for n in 1..=3 {
            h.push(&report(n));
        }
        let last = h.snapshot_last_n(10);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].items_found, 2);
        assert_eq!(last[1].items_found, 3);
        assert_eq!((last[1].analyzed, last[1].failed), (1, 1));
    }
}
