//! util — общие хелперы CLI.
//!
//! Содержит:
//! - process_memory(): RSS/пик RSS процесса (Linux /proc/self/status, best-effort).
//! - human_bytes(): "512.0 MiB"-форматирование для логов.

use serde::Serialize;

/// Память процесса в байтах.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessMemory {
    pub rss_bytes: u64,
    pub peak_rss_bytes: u64,
}

/// Текущая и пиковая RSS. None, если платформа не даёт /proc/self/status.
pub fn process_memory() -> Option<ProcessMemory> {
    let text = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_proc_status(&text)
}

fn parse_proc_status(text: &str) -> Option<ProcessMemory> {
    let mut rss = None;
    let mut hwm = None;
    for line in text.lines() {
        if let Some(v) = line.strip_prefix("VmRSS:") {
            rss = parse_kb(v);
        } else if let Some(v) = line.strip_prefix("VmHWM:") {
            hwm = parse_kb(v);
        }
    }
    let rss = rss?;
    Some(ProcessMemory {
        rss_bytes: rss,
        peak_rss_bytes: hwm.unwrap_or(rss),
    })
}

// "   123456 kB" -> байты
fn parse_kb(v: &str) -> Option<u64> {
    let num = v.trim().strip_suffix("kB")?.trim();
    num.parse::<u64>().ok().map(|kb| kb * 1024)
}

pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut v = n as f64;
    let mut i = 0;
    while v >= 1024.0 && i < UNITS.len() - 1 {
        v /= 1024.0;
        i += 1;
    }
    if i == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", v, UNITS[i])
    }
}
