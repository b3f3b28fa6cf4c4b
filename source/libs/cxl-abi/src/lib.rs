// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: CXL memdev mailbox ABI shared by the engine and its transports
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (mirrors include/uapi/linux/cxl_mem.h)
//! TEST_COVERAGE: Unit tests per module + `tests/wire_layout.rs`
//!
//! PUBLIC API:
//!   - ioctl: CXL_MEM_QUERY_COMMANDS / CXL_MEM_SEND_COMMAND request numbers
//!   - command: CommandId table, CommandFlags, mailbox opcodes
//!   - query: CommandInfo descriptors + query buffer encode/decode
//!   - send: `#[repr(C)]` SendCommand argument block
//!   - payload: bounds-checked views over standard mailbox payloads
//!
//! INVARIANTS: all multi-byte fields are host (little-endian) order; every decode checks
//! lengths before reading and never panics on short input.
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

use core::fmt;

pub mod command;
pub mod ioctl;
pub mod payload;
pub mod query;
pub mod send;

pub use command::{CommandFlags, CommandId};
pub use query::{CommandInfo, CommandInfoIter};
pub use send::{PayloadDesc, SendCommand};

/// Errors produced while reading or writing mailbox wire data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "decode errors must be handled"]
pub enum DecodeError {
    /// Buffer shorter than the structure being read or written.
    Short {
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short { need, have } => {
                write!(f, "buffer too short: need {need} bytes, have {have}")
            }
        }
    }
}

pub(crate) fn ensure_len(buf: &[u8], need: usize) -> Result<(), DecodeError> {
    if buf.len() < need {
        return Err(DecodeError::Short { need, have: buf.len() });
    }
    Ok(())
}

pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}
