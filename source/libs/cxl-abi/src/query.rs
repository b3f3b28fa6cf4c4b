// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `CXL_MEM_QUERY_COMMANDS` buffer layout.
//!
//! Buffer: `[n_commands:u32][rsvd:u32][CommandInfo; n]`, each descriptor
//! `[id:u32][flags:u32][size_in:i32][size_out:i32]`.
//!
//! With `n_commands == 0` the kernel writes back the total count and nothing else; otherwise it
//! fills at most `n_commands` descriptors and leaves the header untouched.

use crate::command::{CommandFlags, CommandId};
use crate::{ensure_len, read_u32, DecodeError};

/// Length of the query header.
pub const QUERY_HEADER_LEN: usize = 8;
/// Length of one command descriptor.
pub const COMMAND_INFO_LEN: usize = 16;
/// Size sentinel meaning "caller supplies the length".
pub const VARIABLE_PAYLOAD: i32 = -1;

/// Largest descriptor count accepted from a device. The kernel table holds a few dozen.
pub const MAX_QUERY_COMMANDS: u32 = 4096;

/// Bytes needed to hold a query reply with `n` descriptors; `None` when that overflows `usize`.
pub const fn query_buffer_len(n: u32) -> Option<usize> {
    match (n as usize).checked_mul(COMMAND_INFO_LEN) {
        Some(body) => body.checked_add(QUERY_HEADER_LEN),
        None => None,
    }
}

/// Writes the request header (`n_commands`, reserved zero).
pub fn encode_query_header(n_commands: u32, out: &mut [u8]) -> Result<(), DecodeError> {
    ensure_len(out, QUERY_HEADER_LEN)?;
    out[0..4].copy_from_slice(&n_commands.to_le_bytes());
    out[4..8].fill(0);
    Ok(())
}

/// Reads `n_commands` back out of a query buffer.
pub fn decode_query_count(buf: &[u8]) -> Result<u32, DecodeError> {
    ensure_len(buf, QUERY_HEADER_LEN)?;
    Ok(read_u32(buf, 0))
}

/// Count carried by a query request, once `buf` is known to hold that many descriptors.
///
/// The kernel writes up to the header's count past the header, so a request buffer must be
/// checked with this before it is handed over.
pub fn checked_query_count(buf: &[u8]) -> Result<u32, DecodeError> {
    let n = decode_query_count(buf)?;
    ensure_len(buf, query_buffer_len(n).unwrap_or(usize::MAX))?;
    Ok(n)
}

/// One entry of the capability catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommandInfo {
    /// Kernel command id.
    pub id: u32,
    /// Effect flags.
    pub flags: CommandFlags,
    /// Declared input size; negative means variable.
    pub size_in: i32,
    /// Declared output size; negative means variable.
    pub size_out: i32,
}

impl CommandInfo {
    /// Builds a descriptor.
    pub const fn new(id: u32, flags: CommandFlags, size_in: i32, size_out: i32) -> Self {
        Self { id, flags, size_in, size_out }
    }

    /// Decodes one descriptor from the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(bytes, COMMAND_INFO_LEN)?;
        Ok(Self {
            id: read_u32(bytes, 0),
            flags: CommandFlags::from_bits_retain(read_u32(bytes, 4)),
            size_in: read_u32(bytes, 8) as i32,
            size_out: read_u32(bytes, 12) as i32,
        })
    }

    /// Encodes the descriptor into the start of `out`.
    pub fn encode(&self, out: &mut [u8]) -> Result<(), DecodeError> {
        ensure_len(out, COMMAND_INFO_LEN)?;
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        out[8..12].copy_from_slice(&self.size_in.to_le_bytes());
        out[12..16].copy_from_slice(&self.size_out.to_le_bytes());
        Ok(())
    }

    /// Fixed input length, or `None` when variable.
    pub fn input_len(&self) -> Option<usize> {
        usize::try_from(self.size_in).ok()
    }

    /// Fixed output length, or `None` when variable.
    pub fn output_len(&self) -> Option<usize> {
        usize::try_from(self.size_out).ok()
    }

    /// Known kernel id, if any.
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::from_raw(self.id)
    }

    /// Name for diagnostics; falls back to "Unknown Command".
    pub fn name(&self) -> &'static str {
        self.command_id().map(CommandId::name).unwrap_or("Unknown Command")
    }
}

/// Iterator over the descriptors following a query header.
#[derive(Clone, Debug)]
pub struct CommandInfoIter<'a> {
    rest: &'a [u8],
    remaining: usize,
}

impl<'a> CommandInfoIter<'a> {
    /// Iterates over at most `count` descriptors in `buf` (header included).
    ///
    /// Stops early, without error, when the buffer holds fewer descriptors than `count`.
    pub fn new(buf: &'a [u8], count: u32) -> Result<Self, DecodeError> {
        ensure_len(buf, QUERY_HEADER_LEN)?;
        Ok(Self { rest: &buf[QUERY_HEADER_LEN..], remaining: count as usize })
    }
}

impl Iterator for CommandInfoIter<'_> {
    type Item = CommandInfo;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let info = CommandInfo::decode(self.rest).ok()?;
        self.rest = &self.rest[COMMAND_INFO_LEN..];
        self.remaining -= 1;
        Some(info)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let fit = self.rest.len() / COMMAND_INFO_LEN;
        let n = fit.min(self.remaining);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_golden_bytes() {
        let info = CommandInfo::new(6, CommandFlags::ENABLED, 8, VARIABLE_PAYLOAD);
        let mut out = [0u8; COMMAND_INFO_LEN];
        info.encode(&mut out).unwrap();
        const GOLDEN: [u8; 16] = [6, 0, 0, 0, 1, 0, 0, 0, 8, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        assert_eq!(out, GOLDEN);
        assert_eq!(CommandInfo::decode(&GOLDEN).unwrap(), info);
    }

    #[test]
    fn variable_sizes_have_no_fixed_length() {
        let info = CommandInfo::new(2, CommandFlags::empty(), VARIABLE_PAYLOAD, -7);
        assert_eq!(info.input_len(), None);
        assert_eq!(info.output_len(), None);
        let fixed = CommandInfo::new(1, CommandFlags::empty(), 0, 67);
        assert_eq!(fixed.input_len(), Some(0));
        assert_eq!(fixed.output_len(), Some(67));
    }

    #[test]
    fn iterator_stops_at_buffer_end() {
        let mut buf = [0u8; QUERY_HEADER_LEN + 2 * COMMAND_INFO_LEN];
        encode_query_header(5, &mut buf).unwrap();
        CommandInfo::new(1, CommandFlags::empty(), 0, 67).encode(&mut buf[8..]).unwrap();
        CommandInfo::new(7, CommandFlags::empty(), 0, 18).encode(&mut buf[24..]).unwrap();
        let count = decode_query_count(&buf).unwrap();
        assert_eq!(count, 5);
        let ids: [u32; 2] = {
            let mut it = CommandInfoIter::new(&buf, count).unwrap();
            [it.next().unwrap().id, it.next().unwrap().id]
        };
        assert_eq!(ids, [1, 7]);
        assert_eq!(CommandInfoIter::new(&buf, count).unwrap().count(), 2);
    }

    #[test]
    fn buffer_len_checks_overflow() {
        assert_eq!(query_buffer_len(0), Some(QUERY_HEADER_LEN));
        assert_eq!(query_buffer_len(3), Some(56));
        if usize::BITS == 32 {
            assert_eq!(query_buffer_len(u32::MAX), None);
        }
    }

    #[test]
    fn request_count_must_fit_the_buffer() {
        let mut buf = [0u8; QUERY_HEADER_LEN];
        encode_query_header(0, &mut buf).unwrap();
        assert_eq!(checked_query_count(&buf), Ok(0));
        encode_query_header(100, &mut buf).unwrap();
        assert_eq!(checked_query_count(&buf), Err(DecodeError::Short { need: 1608, have: 8 }));

        let mut sized = [0u8; QUERY_HEADER_LEN + COMMAND_INFO_LEN];
        encode_query_header(1, &mut sized).unwrap();
        assert_eq!(checked_query_count(&sized), Ok(1));
    }

    #[test]
    fn short_header_is_rejected() {
        assert_eq!(decode_query_count(&[0u8; 7]), Err(DecodeError::Short { need: 8, have: 7 }));
    }
}
