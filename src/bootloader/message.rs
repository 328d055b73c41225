// CLASSIFICATION: COMMUNITY
// Filename: message.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16
//
// ─────────────────────────────────────────────────────────────
// Cohesix · Boot Control Block Layout
//
// The control block is read by the boot firmware before any OS
// loads, so its byte layout is fixed:
//
//   offset    0  command   32 bytes
//   offset   32  status    32 bytes
//   offset   64  recovery  1024 bytes
//
// Each field is NUL-terminated text inside its width. Erased
// flash (0x00 or 0xFF in the first byte) decodes as empty.
//
// # Public API
// * [`ControlBlock`] – decoded record
// * [`ControlBlock::encode`] / [`ControlBlock::decode`]
// ─────────────────────────────────────────────────────────────

/// Width of the `command` field in bytes.
pub const COMMAND_LEN: usize = 32;
/// Width of the `status` field in bytes.
pub const STATUS_LEN: usize = 32;
/// Width of the `recovery` field in bytes.
pub const RECOVERY_LEN: usize = 1024;
/// Total size of the encoded record.
pub const CONTROL_BLOCK_SIZE: usize = COMMAND_LEN + STATUS_LEN + RECOVERY_LEN;

const STATUS_OFFSET: usize = COMMAND_LEN;
const RECOVERY_OFFSET: usize = COMMAND_LEN + STATUS_LEN;

/// Command value that keeps the device booting into recovery.
pub const BOOT_RECOVERY: &str = "boot-recovery";
/// First line of a well-formed `recovery` field.
pub const RECOVERY_MAGIC: &str = "recovery";

/// Decoded boot control block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    /// Next-boot target, e.g. `boot-recovery` or `update-radio`.
    pub command: String,
    /// Status written back by firmware.
    pub status: String,
    /// Newline-separated argument text, first line `recovery`.
    pub recovery: String,
}

impl ControlBlock {
    /// Record that re-enters recovery with `args`, one per line.
    pub fn for_recovery<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut recovery = format!("{RECOVERY_MAGIC}\n");
        for arg in args {
            recovery.push_str(arg.as_ref());
            recovery.push('\n');
        }
        Self {
            command: BOOT_RECOVERY.into(),
            status: String::new(),
            recovery,
        }
    }

    /// True when the record carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.command.is_empty() && self.status.is_empty() && self.recovery.is_empty()
    }

    /// Serialise into the fixed on-device layout.
    ///
    /// Text longer than a field is truncated to `width - 1` bytes so the
    /// terminating NUL always fits.
    pub fn encode(&self) -> [u8; CONTROL_BLOCK_SIZE] {
        let mut buf = [0u8; CONTROL_BLOCK_SIZE];
        put_field(&mut buf[..STATUS_OFFSET], &self.command);
        put_field(&mut buf[STATUS_OFFSET..RECOVERY_OFFSET], &self.status);
        put_field(&mut buf[RECOVERY_OFFSET..], &self.recovery);
        buf
    }

    /// Decode the fixed on-device layout.
    pub fn decode(buf: &[u8; CONTROL_BLOCK_SIZE]) -> Self {
        Self {
            command: get_field(&buf[..STATUS_OFFSET]),
            status: get_field(&buf[STATUS_OFFSET..RECOVERY_OFFSET]),
            recovery: get_field(&buf[RECOVERY_OFFSET..]),
        }
    }
}

fn put_field(dst: &mut [u8], text: &str) {
    let max = dst.len() - 1;
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&text.as_bytes()[..end]);
}

fn get_field(src: &[u8]) -> String {
    match src.first() {
        None | Some(0x00) | Some(0xFF) => return String::new(),
        _ => {}
    }
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}
