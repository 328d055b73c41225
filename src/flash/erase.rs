// CLASSIFICATION: COMMUNITY
// Filename: erase.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Erase-before-write access to MTD flash.
//!
//! NAND/NOR cells can only be programmed from 1 to 0, so every block is
//! erased (set to 0xFF) right before it is written. Writes go a whole
//! erase block at a time; blocks the driver reports bad are skipped.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use log::{debug, warn};

use super::mtd::WriteSession;

/// Flash device addressed in erase blocks.
pub trait EraseBlockDevice {
    /// Size of one erase block in bytes.
    fn erase_size(&self) -> usize;
    /// Total size of the device in bytes.
    fn size(&self) -> u64;
    /// True when the block at `offset` is marked bad.
    fn is_bad(&self, offset: u64) -> io::Result<bool>;
    /// Erase the block starting at `offset`.
    fn erase(&self, offset: u64) -> io::Result<()>;
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()>;
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()>;
}

// <mtd/mtd-abi.h>
#[repr(C)]
#[derive(Debug, Default)]
#[allow(dead_code)]
struct MtdInfoUser {
    kind: u8,
    flags: u32,
    size: u32,
    erasesize: u32,
    writesize: u32,
    oobsize: u32,
    padding: u64,
}

#[repr(C)]
struct EraseInfoUser {
    start: u32,
    length: u32,
}

const MEMGETINFO: u32 = 0x8020_4d01;
const MEMERASE: u32 = 0x4008_4d02;
const MEMGETBADBLOCK: u32 = 0x4008_4d0b;

/// True when `path` is a character device, i.e. an MTD node rather
/// than an image file.
pub fn is_char_device(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false)
}

/// MTD character device (`/dev/mtd/mtdN`).
#[derive(Debug)]
pub struct MtdDevice {
    file: File,
    erase_size: usize,
    size: u64,
}

impl MtdDevice {
    /// Open `path` for reading and writing and query its geometry.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut info = MtdInfoUser::default();
        // SAFETY: MEMGETINFO fills a `struct mtd_info_user`, which
        // `MtdInfoUser` mirrors, and the pointer is valid for the call.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), MEMGETINFO as _, &mut info as *mut MtdInfoUser) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if info.erasesize == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zero erase size"));
        }
        debug!(
            "{}: size 0x{:x}, erase size 0x{:x}",
            path.display(),
            info.size,
            info.erasesize
        );
        Ok(Self {
            file,
            erase_size: info.erasesize as usize,
            size: u64::from(info.size),
        })
    }
}

impl EraseBlockDevice for MtdDevice {
    fn erase_size(&self) -> usize {
        self.erase_size
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_bad(&self, offset: u64) -> io::Result<bool> {
        let mut pos = offset as libc::loff_t;
        // SAFETY: MEMGETBADBLOCK reads one `loff_t` through the pointer.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), MEMGETBADBLOCK as _, &mut pos as *mut libc::loff_t) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // NOR flash has no bad block table.
            if err.raw_os_error() == Some(libc::EOPNOTSUPP) {
                return Ok(false);
            }
            return Err(err);
        }
        Ok(rc > 0)
    }

    fn erase(&self, offset: u64) -> io::Result<()> {
        let mut req = EraseInfoUser {
            start: u32::try_from(offset)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset beyond 4 GiB"))?,
            length: self.erase_size as u32,
        };
        // SAFETY: MEMERASE reads one `struct erase_info_user`.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), MEMERASE as _, &mut req as *mut EraseInfoUser) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        self.file.write_all_at(buf, offset)
    }
}

/// Rewrite `data` at `offset`, keeping the rest of every erase block it
/// touches.
pub fn rewrite_region<D: EraseBlockDevice + ?Sized>(dev: &D, offset: u64, data: &[u8]) -> io::Result<()> {
    let block = dev.erase_size() as u64;
    let start = offset / block * block;
    let end = (offset + data.len() as u64).div_ceil(block) * block;
    if end > dev.size() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "region past end of device"));
    }
    let mut region = vec![0u8; (end - start) as usize];
    dev.read_at(&mut region, start)?;
    let at = (offset - start) as usize;
    region[at..at + data.len()].copy_from_slice(data);

    for (i, chunk) in region.chunks(block as usize).enumerate() {
        let pos = start + i as u64 * block;
        dev.erase(pos)?;
        dev.write_at(chunk, pos)?;
    }
    Ok(())
}

/// Sequential writer that erases each block before programming it.
///
/// Data is staged a block at a time; the final partial block is padded
/// with zeros on [`close`](WriteSession::close).
pub struct BlockWriter<D> {
    dev: D,
    buf: Vec<u8>,
    offset: u64,
}

impl<D: EraseBlockDevice> BlockWriter<D> {
    /// Writer starting at the beginning of `dev`.
    pub fn new(dev: D) -> Self {
        let cap = dev.erase_size();
        Self {
            dev,
            buf: Vec::with_capacity(cap),
            offset: 0,
        }
    }

    /// Give back the device.
    pub fn into_inner(self) -> D {
        self.dev
    }

    fn write_block(&mut self) -> io::Result<()> {
        let block = self.dev.erase_size() as u64;
        loop {
            if self.offset + block > self.dev.size() {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "no space left on partition"));
            }
            let pos = self.offset;
            self.offset += block;
            if self.dev.is_bad(pos)? {
                warn!("skipping bad block at 0x{pos:08x}");
                continue;
            }
            self.dev.erase(pos)?;
            self.dev.write_at(&self.buf, pos)?;
            self.buf.clear();
            return Ok(());
        }
    }
}

impl<D: EraseBlockDevice> Write for BlockWriter<D> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.dev.erase_size() - self.buf.len();
        let n = data.len().min(room);
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == self.dev.erase_size() {
            self.write_block()?;
        }
        Ok(n)
    }

    // Only whole blocks reach the device; the tail waits for `close`.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: EraseBlockDevice> WriteSession for BlockWriter<D> {
    fn close(mut self: Box<Self>) -> io::Result<()> {
        if !self.buf.is_empty() {
            let block = self.dev.erase_size();
            self.buf.resize(block, 0);
            self.write_block()?;
        }
        Ok(())
    }
}
