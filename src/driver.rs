//! driver — один прогон подсчёта: scanner -> pool -> popcount.
//!
//! Порядок:
//! 1) validate() конфигурации до любой аллокации;
//! 2) единственный последовательный читатель режет источник на окна по
//!    возрастанию offset и отдаёт WorkItem в пул (K задач максимум);
//! 3) после последнего окна — flush leftover отдельной задачей;
//! 4) join всех задач (конец thread::scope), и только потом popcount().
//!
//! Ошибка чтения останавливает выдачу новых окон; уже запущенные задачи
//! дорабатывают, прогон возвращает ошибку без результата.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::bitset::ShardedBitSet;
use crate::config::CountConfig;
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::pool::{AdmissionGate, WorkerPool};
use crate::scanner::ChunkScanner;
use crate::source::{open_source, ByteSource};

#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    /// Число различных валидных адресов.
    pub unique: u64,
    pub input_bytes: u64,
    pub elapsed_ms: u64,
    pub metrics: MetricsSnapshot,
}

impl CountReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Прогресс по ~10% шагам.
struct Progress {
    total: u64,
    next_pct: u64,
}

impl Progress {
    fn new(total: u64) -> Self {
        Self { total, next_pct: 10 }
    }

    fn bump(&mut self, done: u64) {
        if self.total == 0 {
            return;
        }
        let pct = done.saturating_mul(100) / self.total;
        if pct >= self.next_pct {
            info!("processed: {}% ({} / {} B)", pct, done, self.total);
            self.next_pct = (pct / 10 + 1) * 10;
        }
    }
}

/// Подсчитать различные IPv4 в источнике.
pub fn count_unique(source: &dyn ByteSource, cfg: &CountConfig) -> Result<CountReport> {
    cfg.validate()?;
    let start = Instant::now();
    let total = source.len();

    let set = ShardedBitSet::with_space_bits(cfg.shard_count, cfg.space_bits)?;
    debug!(
        "bitmap: {} shards x {} B ({} B total)",
        set.shard_count(),
        set.shard_bytes(),
        set.heap_bytes()
    );
    let gate = AdmissionGate::new(cfg.max_in_flight)?;
    let metrics = RunMetrics::new();

    std::thread::scope(|s| -> Result<()> {
        let mut pool = WorkerPool::new(s, &gate, &metrics);
        let fed = feed(source, cfg, &set, &metrics, &mut pool);
        // join даже при ошибке чтения: никаких висящих писателей
        let joined = pool.join();
        fed?;
        joined.map(|_| ())
    })?;

    // Все писатели завершены: scope выше закрыт.
    let unique = set.popcount();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let snap = metrics.snapshot();
    info!(
        "unique={} lines={} malformed={} windows={} tasks={} elapsed={}ms",
        unique, snap.lines_total, snap.lines_malformed, snap.windows_read, snap.tasks_dispatched, elapsed_ms
    );

    Ok(CountReport {
        unique,
        input_bytes: total,
        elapsed_ms,
        metrics: snap,
    })
}

fn feed<'scope, 'env>(
    source: &dyn ByteSource,
    cfg: &CountConfig,
    set: &'env ShardedBitSet,
    metrics: &RunMetrics,
    pool: &mut WorkerPool<'scope, 'env>,
) -> Result<()> {
    let total = source.len();
    let mut scanner = ChunkScanner::new(cfg.chunk_size);
    let mut progress = Progress::new(total);
    let mut offset = 0u64;

    while offset < total {
        let w = scanner
            .next_window(source, offset, cfg.chunk_size)
            .with_context(|| format!("read window at offset {}", offset))?;
        metrics.record_window(w.read);
        offset += w.read as u64;
        debug!(
            "window @{}: read {} B, {} B of lines, leftover {} B",
            w.offset,
            w.read,
            w.item.byte_len(),
            scanner.leftover().len()
        );
        if !w.item.is_empty() {
            pool.dispatch_item(w.item, set)?;
        }
        progress.bump(offset);
    }

    let tail = scanner.finish();
    if !tail.is_empty() {
        pool.dispatch_item(tail, set)?;
    }
    Ok(())
}

/// Открыть файл по конфигурации (mmap / file) и посчитать.
pub fn count_unique_file(path: &Path, cfg: &CountConfig) -> Result<CountReport> {
    cfg.validate()?;
    let source = open_source(path, cfg.use_mmap)?;
    info!(
        "input {}: {} bytes via {}",
        path.display(),
        source.len(),
        if cfg.use_mmap { "mmap" } else { "file reads" }
    );
    count_unique(source.as_ref(), cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemSource;

    fn small_cfg() -> CountConfig {
        CountConfig::default().with_chunk_size(7).with_max_in_flight(2)
    }

    #[test]
    fn progress_steps_by_ten_percent() {
        let mut p = Progress::new(1000);
        p.bump(50);
        assert_eq!(p.next_pct, 10);
        p.bump(130);
        assert_eq!(p.next_pct, 20);
        p.bump(999);
        assert_eq!(p.next_pct, 100);
        p.bump(1000);
        assert_eq!(p.next_pct, 110);
    }

    #[test]
    fn counts_duplicates_once() {
        let src = MemSource::new(&b"10.0.0.1\n10.0.0.1\n10.0.0.2\n"[..]);
        let r = count_unique(&src, &small_cfg()).unwrap();
        assert_eq!(r.unique, 2);
        assert_eq!(r.metrics.addresses_total, 3);
        assert_eq!(r.metrics.addresses_fresh, 2);
        assert_eq!(r.input_bytes, 27);
    }

    #[test]
    fn invalid_config_rejected_before_work() {
        let src = MemSource::new(&b"1.1.1.1\n"[..]);
        assert!(count_unique(&src, &CountConfig::default().with_shard_count(3)).is_err());
        assert!(count_unique(&src, &CountConfig::default().with_chunk_size(0)).is_err());
    }
}
