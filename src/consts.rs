//! Общие константы: адресное пространство и дефолты конфигурации.

// -------- Address space --------
/// Разрядность IPv4-адреса.
pub const IPV4_BITS: u32 = 32;
/// Число возможных IPv4-адресов (2^32).
pub const IPV4_SPACE: u64 = 1u64 << IPV4_BITS;
/// Размер полного битмапа в байтах (2^32 / 8 = 512 MiB).
pub const IPV4_BITMAP_BYTES: u64 = IPV4_SPACE / 8;

// Наименьшее поддерживаемое пространство: один байт битмапа.
pub const MIN_SPACE_BITS: u32 = 3;

// -------- Defaults --------
pub const DEFAULT_SHARD_COUNT: usize = 256;
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

// -------- Env --------
pub const ENV_SHARDS: &str = "IPC_SHARDS";
pub const ENV_CHUNK_BYTES: &str = "IPC_CHUNK_BYTES";
pub const ENV_MAX_TASKS: &str = "IPC_MAX_TASKS";
pub const ENV_MMAP: &str = "IPC_MMAP";
