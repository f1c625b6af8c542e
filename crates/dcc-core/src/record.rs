use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FILENAME_FIELD_LEN: usize = 128;
pub const HOST_FIELD_LEN: usize = 128;
/// Size of one on-disk status record: three i64, two text fields, two i32.
pub const STATUS_RECORD_LEN: usize = 8 + 8 + 8 + FILENAME_FIELD_LEN + HOST_FIELD_LEN + 4 + 4;
/// Magic written by distcc ("DIH\0").
pub const DCC_STATE_MAGIC: i64 = 0x4449_4800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Startup,
    Blocked,
    Connect,
    Preprocess,
    Send,
    Compile,
    Receive,
    Done,
    Unknown,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::Startup,
        Phase::Blocked,
        Phase::Connect,
        Phase::Preprocess,
        Phase::Send,
        Phase::Compile,
        Phase::Receive,
        Phase::Done,
        Phase::Unknown,
    ];

    /// Maps a raw ordinal from disk. Anything outside the enumeration is `None`.
    pub fn from_ordinal(raw: i32) -> Option<Self> {
        let index = usize::try_from(raw).ok()?;
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Startup => "STARTUP",
            Phase::Blocked => "BLOCKED",
            Phase::Connect => "CONNECT",
            Phase::Preprocess => "PREPROCESS",
            Phase::Send => "SEND",
            Phase::Compile => "COMPILE",
            Phase::Receive => "RECEIVE",
            Phase::Done => "DONE",
            Phase::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicPolicy {
    /// Any non-negative magic is accepted.
    #[default]
    Permissive,
    /// Magic must equal [`DCC_STATE_MAGIC`].
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub source_path: PathBuf,
    pub size_bytes: i64,
    pub magic: i64,
    pub process_id: i64,
    pub filename: String,
    pub host: String,
    pub slot: i32,
    pub phase: Phase,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "truncated status record {}: {found} of {} bytes",
        .path.display(),
        STATUS_RECORD_LEN
    )]
    Truncated { path: PathBuf, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    NonPositiveSize,
    NegativeMagic,
    MagicMismatch,
    NegativePid,
    NegativeSlot,
    BlankHost,
    BlankFilename,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::NonPositiveSize => "non_positive_size",
            InvalidReason::NegativeMagic => "negative_magic",
            InvalidReason::MagicMismatch => "magic_mismatch",
            InvalidReason::NegativePid => "negative_pid",
            InvalidReason::NegativeSlot => "negative_slot",
            InvalidReason::BlankHost => "blank_host",
            InvalidReason::BlankFilename => "blank_filename",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StatusRecord {
    /// Reads and decodes one status file. The handle is dropped on every path.
    pub fn read_from(path: &Path) -> Result<Self, DecodeError> {
        let file = File::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut buf = Vec::with_capacity(STATUS_RECORD_LEN);
        file.take(STATUS_RECORD_LEN as u64)
            .read_to_end(&mut buf)
            .map_err(|source| DecodeError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::decode(path, &buf)
    }

    /// Decodes a big-endian record. Bytes past [`STATUS_RECORD_LEN`] are ignored.
    pub fn decode(path: &Path, bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < STATUS_RECORD_LEN {
            return Err(DecodeError::Truncated {
                path: path.to_path_buf(),
                found: bytes.len(),
            });
        }

        let mut reader = WireReader::new(&bytes[..STATUS_RECORD_LEN]);
        let size_bytes = reader.i64_be();
        let magic = reader.i64_be();
        let process_id = reader.i64_be();
        let filename = decode_text(reader.field(FILENAME_FIELD_LEN));
        let host = decode_text(reader.field(HOST_FIELD_LEN));
        let slot = reader.i32_be();
        let phase = Phase::from_ordinal(reader.i32_be()).unwrap_or_default();

        Ok(Self {
            source_path: path.to_path_buf(),
            size_bytes,
            magic,
            process_id,
            filename,
            host,
            slot,
            phase,
        })
    }

    pub fn validate(&self, policy: MagicPolicy) -> Result<(), InvalidReason> {
        if self.size_bytes <= 0 {
            return Err(InvalidReason::NonPositiveSize);
        }
        if self.magic < 0 {
            return Err(InvalidReason::NegativeMagic);
        }
        if policy == MagicPolicy::Strict && self.magic != DCC_STATE_MAGIC {
            return Err(InvalidReason::MagicMismatch);
        }
        if self.process_id < 0 {
            return Err(InvalidReason::NegativePid);
        }
        if self.slot < 0 {
            return Err(InvalidReason::NegativeSlot);
        }
        if self.host.trim().is_empty() {
            return Err(InvalidReason::BlankHost);
        }
        if self.filename.trim().is_empty() {
            return Err(InvalidReason::BlankFilename);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate(MagicPolicy::Permissive).is_ok()
    }
}

/// Cursor over a buffer whose length was checked against the fixed layout.
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn field(&mut self, len: usize) -> &'a [u8] {
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        out
    }

    fn i64_be(&mut self) -> i64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.field(8));
        i64::from_be_bytes(raw)
    }

    fn i32_be(&mut self) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.field(4));
        i32::from_be_bytes(raw)
    }
}

fn decode_text(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    let bytes = &field[..end];
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|b| char::from(*b)).collect(),
    };
    text.trim_end().to_string()
}
