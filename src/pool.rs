//! pool — ограниченный пул задач поверх std::thread::scope.
//!
//! AdmissionGate — счётный семафор на bounded-канале crossbeam ёмкостью K:
//! acquire() кладёт токен (блокируется, если в канале уже K токенов),
//! drop(Permit) забирает токен обратно. Одновременно активны не более K задач.
//!
//! WorkerPool::dispatch() сначала берёт слот, потом запускает scoped-поток.
//! join() дожидается всех задач и суммирует их TaskTally; паника воркера
//! превращается в ошибку.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::warn;
use std::thread::{Scope, ScopedJoinHandle};

use crate::bitset::ShardedBitSet;
use crate::codec::{format_addr, parse_line, Parsed};
use crate::metrics::{RunMetrics, TaskTally};
use crate::scanner::WorkItem;

pub struct AdmissionGate {
    tx: Sender<()>,
    rx: Receiver<()>,
    capacity: usize,
}

/// Занятый слот гейта; освобождается на Drop.
pub struct Permit<'g> {
    gate: &'g AdmissionGate,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("admission gate capacity must be > 0"));
        }
        let (tx, rx) = bounded(capacity);
        Ok(Self { tx, rx, capacity })
    }

    /// Блокирует, пока занято `capacity` слотов.
    pub fn acquire(&self) -> Result<Permit<'_>> {
        self.tx
            .send(())
            .map_err(|_| anyhow!("admission gate disconnected"))?;
        Ok(Permit { gate: self })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Сколько слотов занято сейчас.
    pub fn occupied(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // токен точно есть: его положил acquire() этого permit
        let _ = self.gate.rx.try_recv();
    }
}

// Метрики закрываются раньше, чем освобождается слот (поле permit дропается
// после тела drop), так что in_flight <= K и при панике задачи.
struct Slot<'a> {
    metrics: &'a RunMetrics,
    _permit: Permit<'a>,
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        self.metrics.record_task_end();
    }
}

pub struct WorkerPool<'scope, 'env> {
    scope: &'scope Scope<'scope, 'env>,
    gate: &'env AdmissionGate,
    metrics: &'env RunMetrics,
    handles: Vec<ScopedJoinHandle<'scope, TaskTally>>,
    total: TaskTally,
    failed: usize,
    spawned: u64,
}

impl<'scope, 'env> WorkerPool<'scope, 'env> {
    pub fn new(
        scope: &'scope Scope<'scope, 'env>,
        gate: &'env AdmissionGate,
        metrics: &'env RunMetrics,
    ) -> Self {
        Self {
            scope,
            gate,
            metrics,
            handles: Vec::with_capacity(gate.capacity()),
            total: TaskTally::default(),
            failed: 0,
            spawned: 0,
        }
    }

    /// Запустить задачу, предварительно дождавшись свободного слота.
    pub fn dispatch<F>(&mut self, task: F) -> Result<()>
    where
        F: FnOnce() -> TaskTally + Send + 'scope,
    {
        let permit = self.gate.acquire()?;
        self.metrics.record_task_start();
        let slot = Slot {
            metrics: self.metrics,
            _permit: permit,
        };
        let metrics = self.metrics;

        let handle = std::thread::Builder::new()
            .name(format!("ipcount-worker-{}", self.spawned))
            .spawn_scoped(self.scope, move || {
                let _slot = slot;
                let tally = task();
                metrics.record_tally(&tally);
                tally
            })
            .map_err(|e| anyhow!("spawn worker: {}", e))?;
        self.spawned += 1;
        self.handles.push(handle);
        self.reap_finished();
        Ok(())
    }

    /// Задача разбора одного WorkItem в битмап.
    pub fn dispatch_item(&mut self, item: WorkItem, set: &'env ShardedBitSet) -> Result<()> {
        self.dispatch(move || mark_lines(&item, set))
    }

    /// Забрать уже завершённые потоки, чтобы список хэндлов не рос с размером входа.
    fn reap_finished(&mut self) {
        let mut i = 0;
        while i < self.handles.len() {
            if self.handles[i].is_finished() {
                let h = self.handles.swap_remove(i);
                self.absorb(h);
            } else {
                i += 1;
            }
        }
    }

    fn absorb(&mut self, h: ScopedJoinHandle<'scope, TaskTally>) {
        match h.join() {
            Ok(t) => {
                self.total.lines += t.lines;
                self.total.addresses += t.addresses;
                self.total.fresh += t.fresh;
                self.total.empty += t.empty;
                self.total.malformed += t.malformed;
            }
            Err(_) => self.failed += 1,
        }
    }

    /// Дождаться всех задач. Ошибка, если хоть одна упала.
    pub fn join(mut self) -> Result<TaskTally> {
        for h in std::mem::take(&mut self.handles) {
            self.absorb(h);
        }
        if self.failed > 0 {
            return Err(anyhow!("{} worker task(s) panicked", self.failed));
        }
        Ok(self.total)
    }
}

/// Разобрать строки item и отметить валидные адреса.
pub fn mark_lines(item: &WorkItem, set: &ShardedBitSet) -> TaskTally {
    let mut t = TaskTally::default();
    for raw in item.lines() {
        t.lines += 1;
        match parse_line(raw) {
            Parsed::Address(a) if !set.covers(a) => {
                // только при уменьшенном space_bits
                t.malformed += 1;
                warn!("address outside 2^{} space: {}", set.space_bits(), format_addr(a));
            }
            Parsed::Address(a) => {
                t.addresses += 1;
                if set.mark(a) {
                    t.fresh += 1;
                }
            }
            Parsed::Empty => t.empty += 1,
            Parsed::Malformed => {
                t.malformed += 1;
                warn!("invalid IP address: {:?}", String::from_utf8_lossy(raw.trim_ascii()));
            }
        }
    }
    t
}
