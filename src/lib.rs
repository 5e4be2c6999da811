//! ipcount — точный подсчёт различных IPv4-адресов в больших текстовых файлах.
//!
//! Один бит на каждый из 2^32 адресов: строка -> u32 -> бит в шардированном
//! битмапе; в конце — popcount. Файл читается окнами, строки на границах окон
//! склеиваются, окна разбираются пулом с ограничением числа задач.

// Ядро
pub mod codec;   // dotted-quad <-> u32
pub mod bitset;  // ShardedBitSet
pub mod scanner; // ChunkScanner, WorkItem
pub mod pool;    // AdmissionGate, WorkerPool
pub mod driver;  // count_unique

// Окружение
pub mod source;  // ByteSource: mmap / file / memory
pub mod config;
pub mod consts;
pub mod metrics;
pub mod util;
pub mod cli;

// Удобные реэкспорты
pub use bitset::ShardedBitSet;
pub use codec::{format_addr, parse_addr, parse_line, Parsed};
pub use config::CountConfig;
pub use driver::{count_unique, count_unique_file, CountReport};
pub use scanner::{ChunkScanner, ScanWindow, WorkItem};
pub use source::{open_source, ByteSource, FileSource, MemSource, MmapSource};
