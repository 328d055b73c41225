// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16
//
// ─────────────────────────────────────────────────────────────
// Cohesix · Raw Partition Image Writer
//
// Writes an image to a raw partition so that an interrupted write
// is always detected on the next attempt:
//
//  1. Compare the image header with the partition's first bytes;
//     equal means already flashed, so nothing is written.
//  2. Write a zero placeholder in place of the header, then the
//     rest of the image, and commit.
//  3. Reopen, write the real header plus the remainder of the
//     first block, and commit.
//
// Power loss during step 2 leaves the zero placeholder on the
// partition, which can never match a real header.
//
// # Public API
// * [`PartitionFlasher`] – the three steps above
// * [`flash_image_file`] – file-based entry used by `flash_image`
// ─────────────────────────────────────────────────────────────

pub mod erase;
pub mod mtd;

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{IoResultExt, RecoveryError, RecoveryResult};
pub use mtd::{FilePartition, MtdPartition, PartitionTable, RawPartition, WriteSession};

/// Number of leading bytes compared to decide whether to flash.
pub const HEADER_SIZE: usize = 2048;

const COPY_CHUNK: usize = HEADER_SIZE;

/// Result of a successful flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOutcome {
    /// Header already matched; nothing was written.
    AlreadyCurrent,
    /// The image was written; `bytes` counts image bytes after the header.
    Flashed { bytes: u64 },
}

/// Body-first, header-last image writer.
#[derive(Debug, Clone, Copy)]
pub struct PartitionFlasher {
    header_size: usize,
}

impl Default for PartitionFlasher {
    fn default() -> Self {
        Self::new(HEADER_SIZE)
    }
}

fn read_full<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl PartitionFlasher {
    pub fn new(header_size: usize) -> Self {
        Self {
            header_size: header_size.max(1),
        }
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Read the image header. Leaves `image` positioned right after it.
    pub fn read_header<R: Read + ?Sized>(&self, image: &mut R) -> RecoveryResult<Vec<u8>> {
        let mut header = vec![0u8; self.header_size];
        let len = read_full(image, &mut header).context(|| "error reading image header")?;
        if len == 0 {
            return Err(RecoveryError::io(
                "error reading image header",
                io::Error::new(io::ErrorKind::UnexpectedEof, "image is empty"),
            ));
        }
        header.truncate(len);
        Ok(header)
    }

    /// True when the partition already starts with `header`.
    ///
    /// Read failures count as a mismatch.
    pub fn is_current<P: RawPartition + ?Sized>(&self, partition: &P, header: &[u8]) -> bool {
        let name = partition.name();
        let mut current = vec![0u8; header.len()];
        let read = partition
            .open_read()
            .and_then(|mut r| read_full(&mut r, &mut current));
        match read {
            Ok(len) => len == header.len() && current == header,
            Err(e) => {
                warn!("error reading {name}: {e}");
                false
            }
        }
    }

    /// Write a zero placeholder for the header, then every image byte
    /// after it, and commit. `image` must be positioned after the header.
    pub fn write_body<P, R>(&self, partition: &mut P, header_len: usize, image: &mut R) -> RecoveryResult<u64>
    where
        P: RawPartition + ?Sized,
        R: Read + ?Sized,
    {
        let name = partition.name().to_string();
        let mut out = partition
            .open_write()
            .context(|| format!("error writing {name}"))?;
        out.write_all(&vec![0u8; header_len])
            .context(|| format!("error writing {name}"))?;

        let mut buf = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let len = match image.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RecoveryError::io("error reading image", e)),
            };
            out.write_all(&buf[..len])
                .context(|| format!("error writing {name}"))?;
            copied += len as u64;
        }
        out.close().context(|| format!("error closing {name}"))?;
        debug!("wrote {copied} body bytes to {name}");
        Ok(copied)
    }

    /// Reopen the partition, write the real header, complete the first
    /// block from the image, and commit.
    pub fn write_header<P, R>(&self, partition: &mut P, header: &[u8], image: &mut R) -> RecoveryResult<()>
    where
        P: RawPartition + ?Sized,
        R: Read + Seek + ?Sized,
    {
        let name = partition.name().to_string();
        let block_size = partition
            .block_size()
            .context(|| format!("error getting {name} block size"))?;

        let mut out = partition
            .open_write()
            .context(|| format!("error re-opening {name}"))?;
        out.write_all(header)
            .context(|| format!("error re-writing {name}"))?;

        image
            .seek(SeekFrom::Start(header.len() as u64))
            .context(|| "error rewinding image")?;
        let mut left = block_size as i64 - header.len() as i64;
        while left < 0 {
            left += block_size as i64;
        }
        let mut rest = vec![0u8; left as usize];
        let got = read_full(image, &mut rest).context(|| "error reading image")?;
        if got < rest.len() {
            debug!("image ends inside the first block of {name}; zero-filling {} bytes", rest.len() - got);
        }
        out.write_all(&rest)
            .context(|| format!("error writing {name}"))?;
        out.close().context(|| format!("error closing {name}"))?;
        Ok(())
    }

    /// Flash `image` onto `partition`.
    pub fn flash<P, R>(&self, partition: &mut P, image: &mut R) -> RecoveryResult<FlashOutcome>
    where
        P: RawPartition + ?Sized,
        R: Read + Seek + ?Sized,
    {
        let header = self.read_header(image)?;
        if self.is_current(partition, &header) {
            info!("header is the same, not flashing {}", partition.name());
            return Ok(FlashOutcome::AlreadyCurrent);
        }

        info!("flashing {}", partition.name());
        let bytes = self.write_body(partition, header.len(), image)?;
        self.write_header(partition, &header, image)?;
        Ok(FlashOutcome::Flashed { bytes })
    }
}

/// Flash the image file at `image_path`, deleting it afterwards when
/// `delete` is set (also when nothing needed writing).
pub fn flash_image_file<P: RawPartition + ?Sized>(
    flasher: &PartitionFlasher,
    partition: &mut P,
    image_path: &Path,
    delete: bool,
) -> RecoveryResult<FlashOutcome> {
    let mut image =
        File::open(image_path).context(|| format!("error opening {}", image_path.display()))?;
    let outcome = flasher.flash(partition, &mut image)?;
    drop(image);
    if delete {
        if let Err(e) = fs::remove_file(image_path) {
            warn!("Can't delete {}: {e}", image_path.display());
        }
    }
    Ok(outcome)
}
