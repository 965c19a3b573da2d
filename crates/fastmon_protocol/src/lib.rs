//! Fast Monitoring Protocol
//!
//! Message and record types exchanged by the fast monitoring agent, plus the
//! envelope used to carry JSON messages over the broker.
//!
//! # Envelope Format
//!
//! Each broker message is a 3-frame multipart: `[destination, header, payload]`.
//! The destination frame is the subscription topic. The header is 16 bytes,
//! network byte order:
//! ```text
//! [VER:1][FLAGS:1][RES:2][SEQ:8][LEN:4]
//! ```
//!
//! - VER (u8): Envelope version (0x01)
//! - FLAGS (u8): Reserved flag bits, currently always 0
//! - RES (u16): Reserved for future use
//! - SEQ (u64): Per-publisher sequence number
//! - LEN (u32): Payload length in bytes
//!
//! The payload is a UTF-8 JSON object carrying a `msg_type` tag.

pub mod defaults;
pub mod error;
pub mod records;
pub mod types;

pub use records::{
    NewRun, NewStfFile, NewTfFile, NewWorkflowStage, RecordId, RunRecord, StageOutput,
    StfFileRecord, StfMetadata, TfFileRecord, TfMetadata, WorkflowStagePatch,
    WorkflowStageRecord,
};
pub use types::{
    AgentHeartbeat, AgentMessage, AgentStatus, FastmonStatus, FileStatus, HeartbeatStatus,
    InboundMessage, StfReady, TfFileRegistered, WorkflowStageStatus,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use error::{ProtocolError, Result};
use std::io::Cursor;

/// Envelope version
pub const ENVELOPE_VERSION: u8 = 0x01;

/// Header size in bytes
pub const HEADER_SIZE: usize = 16;

/// Maximum payload size (4GB - 1, the max value of u32)
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Envelope header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: u8,
    pub reserved: u16,
    pub sequence: u64,
    pub payload_len: u32,
}

impl Header {
    pub fn new(sequence: u64, payload_len: u32) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            flags: 0,
            reserved: 0,
            sequence,
            payload_len,
        }
    }

    /// Pack header into a 16-byte buffer (big endian).
    pub fn pack(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut buf = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut buf[..]);

        cursor.write_u8(self.version)?;
        cursor.write_u8(self.flags)?;
        cursor.write_u16::<BigEndian>(self.reserved)?;
        cursor.write_u64::<BigEndian>(self.sequence)?;
        cursor.write_u32::<BigEndian>(self.payload_len)?;

        Ok(buf)
    }

    /// Unpack header from a buffer of at least 16 bytes.
    pub fn unpack(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::HeaderTooShort {
                expected: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

        let version = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let reserved = cursor.read_u16::<BigEndian>()?;
        let sequence = cursor.read_u64::<BigEndian>()?;
        let payload_len = cursor.read_u32::<BigEndian>()?;

        if version != ENVELOPE_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: ENVELOPE_VERSION,
                got: version,
            });
        }

        Ok(Self {
            version,
            flags,
            reserved,
            sequence,
            payload_len,
        })
    }
}

/// A broker message: destination topic, header and JSON payload.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub destination: String,
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Create an envelope around an already-serialized payload.
    pub fn new(destination: impl Into<String>, sequence: u64, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let header = Header::new(sequence, payload.len() as u32);
        Ok(Self {
            destination: destination.into(),
            header,
            payload,
        })
    }

    /// Serialize `message` as JSON and wrap it.
    pub fn from_json<T: serde::Serialize>(
        destination: impl Into<String>,
        sequence: u64,
        message: &T,
    ) -> Result<Self> {
        let payload = serde_json::to_vec(message)?;
        Self::new(destination, sequence, payload)
    }

    /// Pack into multipart frames `[destination, header, payload]`.
    pub fn pack(&self) -> Result<Vec<Vec<u8>>> {
        let header_bytes = self.header.pack()?.to_vec();
        Ok(vec![
            self.destination.as_bytes().to_vec(),
            header_bytes,
            self.payload.clone(),
        ])
    }

    /// Unpack from multipart frames.
    pub fn unpack(frames: &[Vec<u8>]) -> Result<Self> {
        if frames.len() != 3 {
            return Err(ProtocolError::InvalidFrameCount {
                expected: 3,
                got: frames.len(),
            });
        }

        let destination = String::from_utf8(frames[0].clone())
            .map_err(|_| ProtocolError::InvalidDestination)?;
        let header = Header::unpack(&frames[1])?;
        let payload = frames[2].clone();

        if payload.len() != header.payload_len as usize {
            return Err(ProtocolError::PayloadLengthMismatch {
                expected: header.payload_len as usize,
                got: payload.len(),
            });
        }

        Ok(Self {
            destination,
            header,
            payload,
        })
    }

    /// Parse the payload as a generic JSON value.
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
