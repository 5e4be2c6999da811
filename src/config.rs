//! Centralized configuration for an ipcount run.
//!
//! Goals:
//! - Single place for the tunables (shards, window size, in-flight cap, source mode).
//! - CountConfig::from_env() reads IPC_* env vars; CLI flags override on top.
//! - validate() rejects broken invariants before any processing starts.
//!
//! Defaults:
//! - shard_count = 256 (2 MiB per shard for the full IPv4 space)
//! - chunk_size = 10 MiB
//! - max_in_flight = 10
//! - use_mmap = true

use anyhow::{anyhow, Result};
use std::fmt;

use crate::bitset::shard_bytes_for;
use crate::consts::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_IN_FLIGHT, DEFAULT_SHARD_COUNT, ENV_CHUNK_BYTES, ENV_MAX_TASKS,
    ENV_MMAP, ENV_SHARDS, IPV4_BITS,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountConfig {
    /// Number of bitmap shards (power of two).
    /// Env: IPC_SHARDS (default 256)
    pub shard_count: usize,

    /// Bytes read from the source per scan window.
    /// Env: IPC_CHUNK_BYTES (default 10 MiB)
    pub chunk_size: usize,

    /// Max worker tasks in flight at once.
    /// Env: IPC_MAX_TASKS (default 10)
    pub max_in_flight: usize,

    /// Address space is 2^space_bits. Only reduced in tests/synthetic runs.
    pub space_bits: u32,

    /// Read input via mmap (true) or positional file reads (false).
    /// Env: IPC_MMAP = 0|1|true|false (default true)
    pub use_mmap: bool,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            space_bits: IPV4_BITS,
            use_mmap: true,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<usize>().ok())
}

fn parse_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl CountConfig {
    /// Load configuration from environment variables on top of defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_usize(ENV_SHARDS) {
            cfg.shard_count = n;
        }
        if let Some(n) = env_usize(ENV_CHUNK_BYTES) {
            cfg.chunk_size = n;
        }
        if let Some(n) = env_usize(ENV_MAX_TASKS) {
            cfg.max_in_flight = n;
        }
        if let Ok(v) = std::env::var(ENV_MMAP) {
            cfg.use_mmap = parse_flag(&v);
        }

        cfg
    }

    pub fn with_shard_count(mut self, n: usize) -> Self {
        self.shard_count = n;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }

    pub fn with_space_bits(mut self, bits: u32) -> Self {
        self.space_bits = bits;
        self
    }

    pub fn with_mmap(mut self, on: bool) -> Self {
        self.use_mmap = on;
        self
    }

    /// Check invariants; must pass before the bitmap is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk size must be > 0"));
        }
        if self.max_in_flight == 0 {
            return Err(anyhow!("max in-flight tasks must be > 0"));
        }
        shard_bytes_for(self.shard_count, self.space_bits)?;
        Ok(())
    }
}

impl fmt::Display for CountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CountConfig {{ shard_count: {}, chunk_size: {}, max_in_flight: {}, space_bits: {}, source: {} }}",
            self.shard_count,
            self.chunk_size,
            self.max_in_flight,
            self.space_bits,
            if self.use_mmap { "mmap" } else { "file" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CountConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.shard_count, 256);
        assert_eq!(cfg.chunk_size, 10 * 1024 * 1024);
        assert_eq!(cfg.max_in_flight, 10);
        assert!(cfg.use_mmap);
    }

    #[test]
    fn validate_rejects_invariant_violations() {
        let base = CountConfig::default();
        assert!(base.clone().with_chunk_size(0).validate().is_err());
        assert!(base.clone().with_max_in_flight(0).validate().is_err());
        assert!(base.clone().with_shard_count(0).validate().is_err());
        assert!(base.clone().with_shard_count(255).validate().is_err());
        assert!(base.clone().with_space_bits(40).validate().is_err());
        assert!(base.clone().with_space_bits(4).with_shard_count(4).validate().is_err());
        assert!(base.with_space_bits(4).with_shard_count(2).validate().is_ok());
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" Yes "));
        assert!(parse_flag("ON"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
    }

    #[test]
    fn display_mentions_source_mode() {
        let s = CountConfig::default().with_mmap(false).to_string();
        assert!(s.contains("source: file"), "{s}");
    }
}
