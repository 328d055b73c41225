// CLASSIFICATION: COMMUNITY
// Filename: mtd.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Raw partition access.
//!
//! Partitions are discovered from `/proc/mtd` and written through
//! their device node. MTD character devices get an erase before every
//! block is programmed ([`MtdPartition`]); anything else, such as an
//! image file, is written in place ([`FilePartition`]). A write session is opened with a mutable borrow
//! of the partition, so only one can be open at a time, and it is
//! committed only by [`WriteSession::close`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::erase::{self, BlockWriter, EraseBlockDevice, MtdDevice};
use crate::error::{IoResultExt, RecoveryError, RecoveryResult};

/// An open, uncommitted write to a partition.
pub trait WriteSession: Write {
    /// Flush and commit everything written in this session.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Raw addressable storage with a fixed block size.
pub trait RawPartition {
    /// Partition name as listed by the scan.
    fn name(&self) -> &str;
    /// Size of one erase/write block.
    fn block_size(&self) -> io::Result<usize>;
    /// Reader positioned at the start of the partition.
    fn open_read(&self) -> io::Result<Box<dyn Read + '_>>;
    /// Writer positioned at the start of the partition.
    fn open_write(&mut self) -> io::Result<Box<dyn WriteSession + '_>>;
}

/// Partition backed by a regular file or block device, written in place.
#[derive(Debug, Clone)]
pub struct FilePartition {
    name: String,
    path: PathBuf,
    block_size: usize,
}

impl FilePartition {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            block_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct FileWriteSession {
    out: BufWriter<File>,
}

impl Write for FileWriteSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl WriteSession for FileWriteSession {
    fn close(self: Box<Self>) -> io::Result<()> {
        let file = self.out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl RawPartition for FilePartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_size(&self) -> io::Result<usize> {
        if self.block_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zero block size"));
        }
        Ok(self.block_size)
    }

    fn open_read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn open_write(&mut self) -> io::Result<Box<dyn WriteSession + '_>> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        debug!("Opened {} for writing", self.path.display());
        Ok(Box::new(FileWriteSession {
            out: BufWriter::new(file),
        }))
    }
}

/// MTD flash partition (`/dev/mtd/mtdN`).
#[derive(Debug, Clone)]
pub struct MtdPartition {
    name: String,
    path: PathBuf,
}

impl MtdPartition {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl RawPartition for MtdPartition {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_size(&self) -> io::Result<usize> {
        Ok(MtdDevice::open(&self.path)?.erase_size())
    }

    fn open_read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn open_write(&mut self) -> io::Result<Box<dyn WriteSession + '_>> {
        let dev = MtdDevice::open(&self.path)?;
        debug!("Opened {} for erase and write", self.path.display());
        Ok(Box::new(BlockWriter::new(dev)))
    }
}

/// One line of `/proc/mtd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdEntry {
    pub index: u32,
    pub name: String,
    pub size: u64,
    pub erase_size: usize,
}

fn parse_line(line: &str) -> Option<MtdEntry> {
    // mtd3: 05a00000 00020000 "system"
    let (dev, rest) = line.split_once(':')?;
    let index = dev.strip_prefix("mtd")?.parse().ok()?;
    let mut fields = rest.split_whitespace();
    let size = u64::from_str_radix(fields.next()?, 16).ok()?;
    let erase_size = usize::from_str_radix(fields.next()?, 16).ok()?;
    let (_, quoted) = rest.split_once('"')?;
    let name = quoted.trim_end().strip_suffix('"')?.to_string();
    Some(MtdEntry {
        index,
        name,
        size,
        erase_size,
    })
}

/// Partitions found by a scan.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    entries: Vec<MtdEntry>,
    dev_dir: PathBuf,
}

impl PartitionTable {
    /// Parse `/proc/mtd` text; device nodes live in `dev_dir`.
    pub fn parse(text: &str, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: text.lines().filter_map(parse_line).collect(),
            dev_dir: dev_dir.into(),
        }
    }

    /// Read and parse `proc_mtd`. An empty result is an error.
    pub fn scan(proc_mtd: &Path, dev_dir: impl Into<PathBuf>) -> RecoveryResult<Self> {
        let text = fs::read_to_string(proc_mtd).context(|| "error scanning partitions")?;
        let table = Self::parse(&text, dev_dir);
        if table.entries.is_empty() {
            return Err(RecoveryError::NoPartitions);
        }
        Ok(table)
    }

    pub fn entries(&self) -> &[MtdEntry] {
        &self.entries
    }

    fn entry(&self, name: &str) -> RecoveryResult<&MtdEntry> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| RecoveryError::PartitionNotFound(name.to_string()))
    }

    /// Device node of the partition called `name`.
    pub fn device_path(&self, name: &str) -> RecoveryResult<PathBuf> {
        let entry = self.entry(name)?;
        Ok(self.dev_dir.join(format!("mtd{}", entry.index)))
    }

    /// Partition called `name`: erase-aware when its node is an MTD
    /// character device, written in place otherwise.
    pub fn find(&self, name: &str) -> RecoveryResult<Box<dyn RawPartition>> {
        let entry = self.entry(name)?;
        let path = self.device_path(name)?;
        if erase::is_char_device(&path) {
            return Ok(Box::new(MtdPartition::new(&entry.name, path)));
        }
        Ok(Box::new(FilePartition::new(&entry.name, path, entry.erase_size)))
    }
}
