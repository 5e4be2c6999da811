//! bitset — шардированный битмап над пространством адресов.
//!
//! Раскладка:
//! - S шардов (S — степень двойки), у каждого свой Mutex и свой буфер
//!   (2^space_bits / 8) / S байт.
//! - Адрес A живёт в шарде `A % S`; локальный индекс внутри шарда `A / S`,
//!   байт `local / 8`, бит `local % 8`. Отображение A -> (shard, byte, bit)
//!   биективно на всём [0, 2^space_bits).
//!
//! Конкурентность:
//! - mark() берёт только лок своего шарда: записи в разные шарды не конкурируют.
//! - popcount() читает все шарды последовательно и осмыслен только после того,
//!   как все писатели завершились (driver гарантирует это через thread::scope).

use anyhow::{anyhow, Result};
use std::sync::{Mutex, MutexGuard};

use crate::consts::{IPV4_BITS, MIN_SPACE_BITS};

struct Shard {
    bits: Mutex<Box<[u8]>>,
}

impl Shard {
    fn new(len: usize) -> Self {
        Self {
            bits: Mutex::new(vec![0u8; len].into_boxed_slice()),
        }
    }

    // Буфер — набор независимых битов, инварианты не рвутся паникой
    // соседнего писателя, поэтому poisoned лок просто снимаем.
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.bits.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ShardedBitSet {
    shards: Box<[Shard]>,
    shard_mask: u64,
    shard_shift: u32,
    shard_bytes: usize,
    space_bits: u32,
}

impl ShardedBitSet {
    /// Полное IPv4-пространство (2^32 бит).
    pub fn new(shard_count: usize) -> Result<Self> {
        Self::with_space_bits(shard_count, IPV4_BITS)
    }

    /// Уменьшенное пространство 2^space_bits (тесты, синтетика).
    pub fn with_space_bits(shard_count: usize, space_bits: u32) -> Result<Self> {
        let shard_bytes = shard_bytes_for(shard_count, space_bits)?;
        let shards = (0..shard_count)
            .map(|_| Shard::new(shard_bytes))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            shards,
            shard_mask: shard_count as u64 - 1,
            shard_shift: shard_count.trailing_zeros(),
            shard_bytes,
            space_bits,
        })
    }

    /// (shard, byte, bit) для адреса.
    #[inline]
    pub fn locate(&self, index: u32) -> (usize, usize, u8) {
        let index = index as u64;
        debug_assert!(index < self.capacity(), "index {} outside 2^{}", index, self.space_bits);
        let shard = (index & self.shard_mask) as usize;
        let local = index >> self.shard_shift;
        let byte = (local >> 3) as usize;
        debug_assert!(byte < self.shard_bytes);
        (shard, byte, (local & 7) as u8)
    }

    /// Выставить бит адреса. true — если бит был нулём (адрес новый).
    #[inline]
    pub fn mark(&self, index: u32) -> bool {
        let (shard, byte, bit) = self.locate(index);
        let mask = 1u8 << bit;
        let mut bits = self.shards[shard].lock();
        let slot = &mut bits[byte];
        let fresh = *slot & mask == 0;
        *slot |= mask;
        fresh
    }

    pub fn contains(&self, index: u32) -> bool {
        let (shard, byte, bit) = self.locate(index);
        self.shards[shard].lock()[byte] & (1u8 << bit) != 0
    }

    /// Сумма установленных битов по всем шардам.
    pub fn popcount(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| s.lock().iter().map(|b| b.count_ones() as u64).sum::<u64>())
            .sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_bytes(&self) -> usize {
        self.shard_bytes
    }

    /// Число адресуемых индексов (2^space_bits).
    pub fn capacity(&self) -> u64 {
        1u64 << self.space_bits
    }

    pub fn space_bits(&self) -> u32 {
        self.space_bits
    }

    #[inline]
    pub fn covers(&self, index: u32) -> bool {
        (index as u64) < self.capacity()
    }

    pub fn heap_bytes(&self) -> u64 {
        self.shard_bytes as u64 * self.shards.len() as u64
    }
}

/// Размер буфера шарда; ошибка, если S/space_bits не делят пространство.
pub fn shard_bytes_for(shard_count: usize, space_bits: u32) -> Result<usize> {
    if !(MIN_SPACE_BITS..=IPV4_BITS).contains(&space_bits) {
        return Err(anyhow!(
            "space_bits must be in {}..={}, got {}",
            MIN_SPACE_BITS,
            IPV4_BITS,
            space_bits
        ));
    }
    if shard_count == 0 || !shard_count.is_power_of_two() {
        return Err(anyhow!("shard count must be a power of two, got {}", shard_count));
    }
    let total_bytes = (1u64 << space_bits) / 8;
    if shard_count as u64 > total_bytes {
        return Err(anyhow!(
            "shard count {} exceeds bitmap size {} B for 2^{} addresses",
            shard_count,
            total_bytes,
            space_bits
        ));
    }
    Ok((total_bytes / shard_count as u64) as usize)
}
