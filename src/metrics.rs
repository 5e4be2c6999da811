//! Lightweight per-run metrics for ipcount.
//!
//! Потокобезопасные атомарные счётчики одного прогона:
//! - Scanner (окна, байты)
//! - Pool (задачи, пик одновременно активных)
//! - Workers (строки, адреса, новые адреса, пустые, битые)
//!
//! RunMetrics живёт столько же, сколько прогон, и разделяется воркерами по &.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RunMetrics {
    // ----- Scanner -----
    windows_read: AtomicU64,
    bytes_read: AtomicU64,

    // ----- Pool -----
    tasks_dispatched: AtomicU64,
    tasks_in_flight: AtomicU64,
    peak_in_flight: AtomicU64,

    // ----- Workers -----
    lines_total: AtomicU64,
    addresses_total: AtomicU64,
    addresses_fresh: AtomicU64,
    lines_empty: AtomicU64,
    lines_malformed: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    // Scanner
    pub windows_read: u64,
    pub bytes_read: u64,

    // Pool
    pub tasks_dispatched: u64,
    pub peak_in_flight: u64,

    // Workers
    pub lines_total: u64,
    pub addresses_total: u64,
    pub addresses_fresh: u64,
    pub lines_empty: u64,
    pub lines_malformed: u64,
}

impl MetricsSnapshot {
    /// Доля дубликатов среди валидных адресов.
    pub fn duplicate_ratio(&self) -> f64 {
        if self.addresses_total == 0 {
            0.0
        } else {
            1.0 - self.addresses_fresh as f64 / self.addresses_total as f64
        }
    }
}

/// Счётчики одной задачи воркера; сливаются в RunMetrics одним add на поле.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskTally {
    pub lines: u64,
    pub addresses: u64,
    pub fresh: u64,
    pub empty: u64,
    pub malformed: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- Recorders (Scanner) -----
    pub fn record_window(&self, bytes: usize) {
        self.windows_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    // ----- Recorders (Pool) -----
    pub fn record_task_start(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
        let now = self.tasks_in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    pub fn record_task_end(&self) {
        self.tasks_in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(1)))
            .ok();
    }

    // ----- Recorders (Workers) -----
    pub fn record_tally(&self, t: &TaskTally) {
        self.lines_total.fetch_add(t.lines, Ordering::Relaxed);
        self.addresses_total.fetch_add(t.addresses, Ordering::Relaxed);
        self.addresses_fresh.fetch_add(t.fresh, Ordering::Relaxed);
        self.lines_empty.fetch_add(t.empty, Ordering::Relaxed);
        self.lines_malformed.fetch_add(t.malformed, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> u64 {
        self.tasks_in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            windows_read: self.windows_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
            lines_total: self.lines_total.load(Ordering::Relaxed),
            addresses_total: self.addresses_total.load(Ordering::Relaxed),
            addresses_fresh: self.addresses_fresh.load(Ordering::Relaxed),
            lines_empty: self.lines_empty.load(Ordering::Relaxed),
            lines_malformed: self.lines_malformed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_tracks_max_in_flight() {
        let m = RunMetrics::new();
        m.record_task_start();
        m.record_task_start();
        m.record_task_end();
        m.record_task_start();
        m.record_task_end();
        m.record_task_end();
        m.record_task_end(); // лишний end не уводит счётчик в минус
        let s = m.snapshot();
        assert_eq!(s.tasks_dispatched, 3);
        assert_eq!(s.peak_in_flight, 2);
        assert_eq!(m.in_flight(), 0);
    }

    #[test]
    fn duplicate_ratio() {
        let m = RunMetrics::new();
        m.record_tally(&TaskTally { lines: 4, addresses: 4, fresh: 1, empty: 0, malformed: 0 });
        assert!((m.snapshot().duplicate_ratio() - 0.75).abs() < 1e-9);
        assert_eq!(MetricsSnapshot::default().duplicate_ratio(), 0.0);
    }
}
