use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use ipcount::{format_addr, ShardedBitSet};

/// Генератор входных файлов для ipcount.
///
/// Примеры:
///   ipcount_gen --out ./ip_addresses --lines 10000000
///   ipcount_gen --out ./small.txt --lines 1000 --distinct 100 --malformed-every 50
#[derive(Parser, Debug)]
#[command(name = "ipcount_gen", version, about = "Generate IPv4 test input for ipcount")]
struct Opt {
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 1_000_000)]
    lines: u64,
    /// Draw addresses from a fixed pool of this size (0 = whole IPv4 space)
    #[arg(long, default_value_t = 0)]
    distinct: u32,
    /// Insert a malformed line every N lines (0 = never)
    #[arg(long, default_value_t = 0)]
    malformed_every: u64,
    /// Omit the final '\n'
    #[arg(long, default_value_t = false)]
    no_trailing_newline: bool,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opt = Opt::parse();
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(opt.seed);

    let pool: Vec<u32> = (0..opt.distinct).map(|_| rng.gen()).collect();
    // Эталон для сверки: тот же битмап, что и у счётчика.
    let expected = ShardedBitSet::new(256)?;

    let f = File::create(&opt.out).with_context(|| format!("create {}", opt.out.display()))?;
    let mut w = BufWriter::with_capacity(1 << 20, f);
    let step = std::cmp::max(1, opt.lines / 10);

    for i in 0..opt.lines {
        if i > 0 {
            w.write_all(b"\n")?;
        }
        if opt.malformed_every > 0 && i % opt.malformed_every == opt.malformed_every - 1 {
            w.write_all(b"not-an-ip")?;
        } else {
            let addr = if pool.is_empty() {
                rng.gen::<u32>()
            } else {
                pool[rng.gen_range(0..pool.len())]
            };
            expected.mark(addr);
            w.write_all(format_addr(addr).as_bytes())?;
        }
        if (i + 1) % step == 0 {
            println!(
                "[gen] {:>10} / {:<10} ({:>5.1}%) elapsed={:.2}s",
                i + 1,
                opt.lines,
                (i + 1) as f64 * 100.0 / opt.lines as f64,
                start.elapsed().as_secs_f64()
            );
        }
    }
    if opt.lines > 0 && !opt.no_trailing_newline {
        w.write_all(b"\n")?;
    }
    w.flush()?;

    println!(
        "wrote {} lines to {} (expected unique: {})",
        opt.lines,
        opt.out.display(),
        expected.popcount()
    );
    Ok(())
}
