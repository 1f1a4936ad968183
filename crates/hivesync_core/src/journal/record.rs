//! Journal record types and framing.
//!
//! Every record is framed as:
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (length) | crc32 (4) |
//! ```
//!
//! The payload is a CBOR-encoded list of [`JournalOp`]s. The CRC covers
//! everything before it.

use crate::changelog::ChangeLogEntry;
use crate::cursor::SyncCursor;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::types::{ChangeId, DeviceId};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"HSJL";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

pub(crate) const HEADER_SIZE: usize = 11;
pub(crate) const CRC_SIZE: usize = 4;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Incremental commit applied on top of prior state.
    Commit = 1,
    /// Full image; replay discards prior state first.
    Snapshot = 2,
}

impl RecordType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// A single state mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Upsert an entity row (soft deletes are puts of a tombstone).
    PutEntity(Entity),
    /// Add a change-log entry.
    AppendChange(ChangeLogEntry),
    /// Flag change-log entries as acknowledged.
    MarkSynced(Vec<ChangeId>),
    /// Drop acknowledged change-log entries.
    CompactSynced,
    /// Replace the sync cursor record.
    SetCursor(SyncCursor),
    /// Record this device's id.
    SetDeviceId(DeviceId),
}

/// One framed unit in the journal.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    /// Commit or snapshot.
    pub record_type: RecordType,
    /// Operations applied in order.
    pub ops: Vec<JournalOp>,
}

impl JournalRecord {
    /// Creates an incremental commit.
    pub fn commit(ops: Vec<JournalOp>) -> Self {
        Self {
            record_type: RecordType::Commit,
            ops,
        }
    }

    /// Creates a full snapshot.
    pub fn snapshot(ops: Vec<JournalOp>) -> Self {
        Self {
            record_type: RecordType::Snapshot,
            ops,
        }
    }

    /// Encodes the framed record.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::into_writer(&self.ops, &mut payload)
            .map_err(|e| CoreError::codec(format!("encode journal record: {e}")))?;

        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::InvalidArgument("journal record too large".into()))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(self.record_type as u8);
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }

    /// Decodes the record starting at the front of `bytes`.
    ///
    /// Returns `Ok(None)` when `bytes` ends before the record does, which is
    /// what a crash mid-append leaves behind. `offset` is only used for
    /// error messages.
    pub fn decode(bytes: &[u8], offset: u64) -> CoreResult<Option<(Self, usize)>> {
        if bytes.len() < HEADER_SIZE {
            return Ok(None);
        }

        if bytes[0..4] != JOURNAL_MAGIC {
            return Err(CoreError::corrupted(offset, "bad magic"));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != JOURNAL_VERSION {
            return Err(CoreError::corrupted(
                offset,
                format!("unsupported journal version {version}"),
            ));
        }

        let record_type = RecordType::from_byte(bytes[6]).ok_or_else(|| {
            CoreError::corrupted(offset, format!("unknown record type {}", bytes[6]))
        })?;

        let len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if bytes.len() < total {
            return Ok(None);
        }

        let body_end = HEADER_SIZE + len;
        let stored_crc = u32::from_le_bytes([
            bytes[body_end],
            bytes[body_end + 1],
            bytes[body_end + 2],
            bytes[body_end + 3],
        ]);
        if compute_crc32(&bytes[..body_end]) != stored_crc {
            return Err(CoreError::corrupted(offset, "checksum mismatch"));
        }

        let ops: Vec<JournalOp> = ciborium::from_reader(&bytes[HEADER_SIZE..body_end])
            .map_err(|e| CoreError::corrupted(offset, format!("undecodable payload: {e}")))?;

        Ok(Some((Self { record_type, ops }, total)))
    }
}

/// CRC32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
