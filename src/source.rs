//! source — доступ к входным байтам по смещению.
//!
//! Ядру нужен только контракт ByteSource: длина + позиционное чтение.
//! Реализации:
//! - MmapSource — весь файл через memmap2 (по умолчанию);
//! - FileSource — позиционные чтения из std::fs::File (ENV IPC_MMAP=0 / --no-mmap);
//! - MemSource  — буфер в памяти (тесты, stdin-подобные входы).

use anyhow::{anyhow, Context, Result};
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait ByteSource: Sync {
    /// Полная длина источника в байтах.
    fn len(&self) -> u64;

    /// Прочитать до buf.len() байт начиная с offset. 0 — только на конце данных.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[inline]
fn copy_from(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    if offset >= data.len() as u64 {
        return 0;
    }
    let start = offset as usize;
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

// -------------------- mmap --------------------

pub struct MmapSource {
    path: PathBuf,
    // None для пустого файла: mmap нулевой длины не создаётся
    map: Option<Mmap>,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open input {}", path.display()))?;
        let len = f.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            // Файл считается неизменяемым на время прогона.
            let m = unsafe { Mmap::map(&f) }
                .map_err(|e| anyhow!("mmap {}: {}", path.display(), e))?;
            Some(m)
        };
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.map.as_ref().map(|m| m.len() as u64).unwrap_or(0)
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match &self.map {
            Some(m) => Ok(copy_from(m, offset, buf)),
            None => Ok(0),
        }
    }
}

// -------------------- buffered file --------------------

pub struct FileSource {
    path: PathBuf,
    len: u64,
    file: Mutex<File>,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        let f = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open input {}", path.display()))?;
        let len = f.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            len,
            file: Mutex::new(f),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|_| anyhow!("input handle poisoned: {}", self.path.display()))?;
        f.seek(SeekFrom::Start(offset))?;
        // read до заполнения буфера или EOF
        let mut done = 0usize;
        while done < buf.len() {
            let n = f
                .read(&mut buf[done..])
                .with_context(|| format!("read {} at {}", self.path.display(), offset + done as u64))?;
            if n == 0 {
                break;
            }
            done += n;
        }
        Ok(done)
    }
}

// -------------------- memory --------------------

pub struct MemSource {
    data: Vec<u8>,
}

impl MemSource {
    pub fn new<B: Into<Vec<u8>>>(data: B) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(copy_from(&self.data, offset, buf))
    }
}

/// Открыть файл как ByteSource: mmap или позиционные чтения.
pub fn open_source(path: &Path, use_mmap: bool) -> Result<Box<dyn ByteSource>> {
    if use_mmap {
        Ok(Box::new(MmapSource::open(path)?))
    } else {
        Ok(Box::new(FileSource::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_source_reads_ranges() {
        let src = MemSource::new(&b"0123456789"[..]);
        let mut buf = [0u8; 4];
        assert_eq!(src.len(), 10);
        assert_eq!(src.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(src.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(src.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(src.read_at(99, &mut buf).unwrap(), 0);
    }

    #[test]
    fn empty_mem_source() {
        let src = MemSource::new(Vec::new());
        assert!(src.is_empty());
        let mut buf = [0u8; 8];
        assert_eq!(src.read_at(0, &mut buf).unwrap(), 0);
    }
}
