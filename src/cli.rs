use anyhow::Result;
use clap::Parser;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::CountConfig;
use crate::driver::{count_unique_file, CountReport};
use crate::util::{human_bytes, process_memory, ProcessMemory};

#[derive(Parser, Debug)]
#[command(
    name = "ipcount",
    version,
    about = "Count distinct IPv4 addresses in a newline-delimited file"
)]
pub struct Cli {
    /// Input file, one IPv4 address per line
    #[arg(long)]
    pub path: PathBuf,

    /// Bitmap shard count (power of two). Env: IPC_SHARDS
    #[arg(long)]
    pub shards: Option<usize>,

    /// Scan window size in bytes. Env: IPC_CHUNK_BYTES
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Max worker tasks in flight. Env: IPC_MAX_TASKS
    #[arg(long)]
    pub max_tasks: Option<usize>,

    /// Positional file reads instead of mmap. Env: IPC_MMAP=0
    #[arg(long, default_value_t = false)]
    pub no_mmap: bool,

    /// Print the report as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    /// Env-конфиг + явные флаги поверх.
    pub fn config(&self) -> CountConfig {
        let mut cfg = CountConfig::from_env();
        if let Some(n) = self.shards {
            cfg = cfg.with_shard_count(n);
        }
        if let Some(n) = self.chunk_size {
            cfg = cfg.with_chunk_size(n);
        }
        if let Some(n) = self.max_tasks {
            cfg = cfg.with_max_in_flight(n);
        }
        if self.no_mmap {
            cfg = cfg.with_mmap(false);
        }
        cfg
    }
}

#[derive(Serialize)]
struct JsonOut<'a> {
    path: String,
    #[serde(flatten)]
    report: &'a CountReport,
    memory: Option<ProcessMemory>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    exec(&cli)
}

pub fn exec(cli: &Cli) -> Result<()> {
    let cfg = cli.config();
    info!("{}", cfg);

    let report = count_unique_file(&cli.path, &cfg)?;
    let memory = process_memory();

    if let Some(m) = memory {
        info!(
            "memory: rss={} peak_rss={}",
            human_bytes(m.rss_bytes),
            human_bytes(m.peak_rss_bytes)
        );
    }
    info!("processing time: {:?}", report.elapsed());

    if cli.json {
        let out = JsonOut {
            path: cli.path.display().to_string(),
            report: &report,
            memory,
        };
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Number of unique IP addresses: {}", report.unique);
    }
    Ok(())
}
