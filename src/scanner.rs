//! scanner — чтение источника окнами фиксированного размера с переносом хвоста.
//!
//! Каждый вызов next_window():
//! - читает до `size` байт по `offset` (последнее окно может быть короче);
//! - склеивает leftover прошлого окна + свежие байты;
//! - всё до последнего '\n' включительно уходит в WorkItem (целые строки),
//!   остаток после него становится новым leftover.
//!
//! После последнего окна вызывающий делает finish(): leftover отдаётся как
//! одна строка (вход без завершающего '\n').
//!
//! Склейка всех WorkItem по порядку + финальный leftover == исходные байты.

use anyhow::{anyhow, Result};

use crate::source::ByteSource;

/// Набор целых строк, принадлежащий одной задаче воркера.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkItem {
    bytes: Vec<u8>,
}

impl WorkItem {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Строки без разделителя. Завершающий '\n' не порождает пустую строку.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        let body = self.bytes.strip_suffix(b"\n").unwrap_or(&self.bytes);
        // пустой item — ноль строк, а не одна пустая
        let skip = self.bytes.is_empty();
        body.split(|&b| b == b'\n').filter(move |_| !skip)
    }
}

/// Результат одного окна.
#[derive(Debug)]
pub struct ScanWindow {
    pub offset: u64,
    /// Сколько байт реально прочитано из источника.
    pub read: usize,
    pub item: WorkItem,
}

pub struct ChunkScanner {
    leftover: Vec<u8>,
    buf: Vec<u8>,
    next_offset: u64,
}

impl ChunkScanner {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            leftover: Vec::new(),
            buf: vec![0u8; chunk_size],
            next_offset: 0,
        }
    }

    /// Хвост после последнего '\n' (ещё не отданный).
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    /// Смещение, с которого должен начаться следующий вызов.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Прочитать окно [offset, offset+size) и отдать целые строки.
    pub fn next_window(&mut self, source: &dyn ByteSource, offset: u64, size: usize) -> Result<ScanWindow> {
        if offset != self.next_offset {
            return Err(anyhow!(
                "scan windows must be contiguous: expected offset {}, got {}",
                self.next_offset,
                offset
            ));
        }
        if size == 0 {
            return Err(anyhow!("scan window size must be > 0"));
        }
        let total = source.len();
        let want = (total.saturating_sub(offset)).min(size as u64) as usize;
        if self.buf.len() < want {
            self.buf.resize(want, 0);
        }

        let mut got = 0usize;
        while got < want {
            let n = source.read_at(offset + got as u64, &mut self.buf[got..want])?;
            if n == 0 {
                return Err(anyhow!(
                    "short read at offset {}: got {} of {} bytes",
                    offset,
                    got,
                    want
                ));
            }
            got += n;
        }
        self.next_offset = offset + got as u64;

        let fresh = &self.buf[..got];
        let item = match fresh.iter().rposition(|&b| b == b'\n') {
            Some(pos) => {
                let mut bytes = Vec::with_capacity(self.leftover.len() + pos + 1);
                bytes.extend_from_slice(&self.leftover);
                bytes.extend_from_slice(&fresh[..=pos]);
                self.leftover.clear();
                self.leftover.extend_from_slice(&fresh[pos + 1..]);
                WorkItem::from_bytes(bytes)
            }
            None => {
                // окно без '\n' целиком продолжает хвост
                self.leftover.extend_from_slice(fresh);
                WorkItem::default()
            }
        };

        Ok(ScanWindow { offset, read: got, item })
    }

    /// Финальный flush: leftover как одна строка.
    pub fn finish(self) -> WorkItem {
        WorkItem::from_bytes(self.leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemSource;

    fn scan_all(input: &[u8], size: usize) -> (Vec<WorkItem>, WorkItem) {
        let src = MemSource::new(input);
        let mut sc = ChunkScanner::new(size);
        let mut items = Vec::new();
        let mut off = 0u64;
        while off < src.len() {
            let w = sc.next_window(&src, off, size).unwrap();
            off += w.read as u64;
            items.push(w.item);
        }
        (items, sc.finish())
    }

    #[test]
    fn lines_skip_trailing_separator() {
        let it = WorkItem::from_bytes(b"a\nb\n".to_vec());
        assert_eq!(it.lines().collect::<Vec<_>>(), vec![&b"a"[..], b"b"]);
        let it = WorkItem::from_bytes(b"a\n\nb\n".to_vec());
        assert_eq!(it.lines().count(), 3);
        let it = WorkItem::from_bytes(b"tail".to_vec());
        assert_eq!(it.lines().collect::<Vec<_>>(), vec![&b"tail"[..]]);
        assert_eq!(WorkItem::default().lines().count(), 0);
        let it = WorkItem::from_bytes(b"\n".to_vec());
        assert_eq!(it.lines().collect::<Vec<_>>(), vec![&b""[..]]);
    }

    #[test]
    fn carries_partial_line_across_windows() {
        let (items, tail) = scan_all(b"1.1.1.1\n2.2.2.2\n3.3", 10);
        assert_eq!(items[0].as_bytes(), b"1.1.1.1\n");
        assert_eq!(items[1].as_bytes(), b"2.2.2.2\n");
        assert_eq!(tail.as_bytes(), b"3.3");
    }

    #[test]
    fn newline_as_last_byte_of_window() {
        // "1.1.1.1\n" ровно 8 байт: окно заканчивается на '\n'
        let (items, tail) = scan_all(b"1.1.1.1\n2.2.2.2\n", 8);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_bytes(), b"1.1.1.1\n");
        assert_eq!(items[1].as_bytes(), b"2.2.2.2\n");
        assert!(tail.is_empty());
    }

    #[test]
    fn window_without_newline_extends_leftover() {
        let (items, tail) = scan_all(b"123456789012345\n9", 4);
        let joined: Vec<u8> = items.iter().flat_map(|i| i.as_bytes().to_vec()).collect();
        assert_eq!(joined, b"123456789012345\n");
        assert_eq!(tail.as_bytes(), b"9");
        assert!(items[0].is_empty());
    }

    #[test]
    fn rejects_out_of_order_offsets() {
        let src = MemSource::new(&b"a\nb\n"[..]);
        let mut sc = ChunkScanner::new(2);
        sc.next_window(&src, 0, 2).unwrap();
        assert!(sc.next_window(&src, 0, 2).is_err());
        assert!(sc.next_window(&src, 3, 2).is_err());
        assert!(sc.next_window(&src, 2, 0).is_err());
    }

    struct ShortSource;

    impl ByteSource for ShortSource {
        fn len(&self) -> u64 {
            100
        }
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            if offset >= 10 {
                return Ok(0);
            }
            let n = buf.len().min(10 - offset as usize);
            buf[..n].fill(b'x');
            Ok(n)
        }
    }

    #[test]
    fn short_read_is_an_error() {
        let mut sc = ChunkScanner::new(64);
        let err = sc.next_window(&ShortSource, 0, 64).unwrap_err();
        assert!(err.to_string().contains("short read"), "{err}");
    }

    #[test]
    fn reconstructs_random_inputs() {
        let mut rng = oorandom::Rand32::new(0xC0FFEE);
        for _ in 0..300 {
            let len = rng.rand_range(0..400) as usize;
            let input: Vec<u8> = (0..len)
                .map(|_| match rng.rand_range(0..5) {
                    0 => b'\n',
                    1 => b'.',
                    _ => b'0' + rng.rand_range(0..10) as u8,
                })
                .collect();
            let size = rng.rand_range(1..64) as usize;
            let (items, tail) = scan_all(&input, size);

            let mut joined = Vec::new();
            for it in &items {
                assert!(it.is_empty() || it.as_bytes().ends_with(b"\n"));
                joined.extend_from_slice(it.as_bytes());
            }
            assert!(!tail.as_bytes().contains(&b'\n'));
            joined.extend_from_slice(tail.as_bytes());
            assert_eq!(joined, input, "window size {}", size);

            // строки через lines() + '\n' дают тот же результат
            let mut relined = Vec::new();
            for it in &items {
                for l in it.lines() {
                    relined.extend_from_slice(l);
                    relined.push(b'\n');
                }
            }
            relined.extend_from_slice(tail.as_bytes());
            assert_eq!(relined, input);
        }
    }
}
