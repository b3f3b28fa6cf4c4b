// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounds-checked views over standard mailbox payloads.
//!
//! A view is built from a byte slice once, after a length check; every accessor afterwards reads
//! inside the checked range. Firmware replies shorter than the structure are rejected rather
//! than read past the end.

use bitflags::bitflags;

use crate::{ensure_len, read_u16, read_u32, read_u64, DecodeError};

/// Capacity granule used by Identify and partition commands (256 MiB).
pub const CAPACITY_MULTIPLIER: u64 = 256 * 1024 * 1024;

/// Length of the Identify Memory Device output payload.
pub const IDENTIFY_LEN: usize = 0x43;

/// Identify Memory Device output (opcode 0x4000).
#[derive(Clone, Copy, Debug)]
pub struct IdentifyView<'a> {
    raw: &'a [u8],
}

impl<'a> IdentifyView<'a> {
    /// Wraps `raw` after checking it holds a full Identify payload.
    pub fn new(raw: &'a [u8]) -> Result<Self, DecodeError> {
        ensure_len(raw, IDENTIFY_LEN)?;
        Ok(Self { raw })
    }

    /// Firmware revision, trimmed at the first NUL.
    pub fn fw_revision(&self) -> &'a [u8] {
        let field = &self.raw[0..16];
        let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
        &field[..end]
    }

    /// Total capacity in bytes.
    pub fn total_capacity(&self) -> u64 {
        read_u64(self.raw, 16).saturating_mul(CAPACITY_MULTIPLIER)
    }

    /// Volatile-only capacity in bytes.
    pub fn volatile_only_capacity(&self) -> u64 {
        read_u64(self.raw, 24).saturating_mul(CAPACITY_MULTIPLIER)
    }

    /// Persistent-only capacity in bytes.
    pub fn persistent_only_capacity(&self) -> u64 {
        read_u64(self.raw, 32).saturating_mul(CAPACITY_MULTIPLIER)
    }

    /// Partition alignment in bytes.
    pub fn partition_align(&self) -> u64 {
        read_u64(self.raw, 40).saturating_mul(CAPACITY_MULTIPLIER)
    }

    /// Event log sizes: informational, warning, failure, fatal.
    pub fn event_log_sizes(&self) -> [u16; 4] {
        [read_u16(self.raw, 48), read_u16(self.raw, 50), read_u16(self.raw, 52), read_u16(self.raw, 54)]
    }

    /// Label storage area size in bytes.
    pub fn lsa_size(&self) -> u32 {
        read_u32(self.raw, 56)
    }

    /// Maximum media error records in the poison list (24-bit field).
    pub fn poison_list_max_records(&self) -> u32 {
        u32::from_le_bytes([self.raw[60], self.raw[61], self.raw[62], 0])
    }

    /// Maximum number of simultaneously injected poison addresses.
    pub fn inject_poison_limit(&self) -> u16 {
        read_u16(self.raw, 63)
    }

    /// Poison handling capability bits.
    pub fn poison_caps(&self) -> u8 {
        self.raw[65]
    }

    /// QoS telemetry capability bits.
    pub fn qos_telemetry_caps(&self) -> u8 {
        self.raw[66]
    }
}

/// Length of the Get Health Info output payload.
pub const HEALTH_INFO_LEN: usize = 0x12;

bitflags! {
    /// Health status byte of Get Health Info.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HealthStatus: u8 {
        /// Maintenance needed.
        const MAINTENANCE_NEEDED = 1 << 0;
        /// Performance degraded.
        const PERFORMANCE_DEGRADED = 1 << 1;
        /// Hardware replacement needed.
        const HW_REPLACEMENT_NEEDED = 1 << 2;
    }
}

/// Get Health Info output (opcode 0x4200).
#[derive(Clone, Copy, Debug)]
pub struct HealthInfoView<'a> {
    raw: &'a [u8],
}

impl<'a> HealthInfoView<'a> {
    /// Wraps `raw` after checking it holds a full health payload.
    pub fn new(raw: &'a [u8]) -> Result<Self, DecodeError> {
        ensure_len(raw, HEALTH_INFO_LEN)?;
        Ok(Self { raw })
    }

    /// Health status bits.
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_bits_retain(self.raw[0])
    }

    /// Media status code (0 = normal).
    pub fn media_status(&self) -> u8 {
        self.raw[1]
    }

    /// Additional status bits.
    pub fn ext_status(&self) -> u8 {
        self.raw[2]
    }

    /// Percentage of device life used.
    pub fn life_used(&self) -> u8 {
        self.raw[3]
    }

    /// Device temperature in degrees Celsius.
    pub fn temperature(&self) -> i16 {
        read_u16(self.raw, 4) as i16
    }

    /// Dirty shutdown count.
    pub fn dirty_shutdowns(&self) -> u32 {
        read_u32(self.raw, 6)
    }

    /// Corrected volatile error count.
    pub fn volatile_errors(&self) -> u32 {
        read_u32(self.raw, 10)
    }

    /// Corrected persistent error count.
    pub fn pmem_errors(&self) -> u32 {
        read_u32(self.raw, 14)
    }
}

/// Length of the Get LSA input payload (`offset:u32, length:u32`).
pub const GET_LSA_LEN: usize = 8;
/// Header preceding the data in a Set LSA input payload (`offset:u32, rsvd:u32`).
pub const SET_LSA_HEADER_LEN: usize = 8;

/// Writes the Get LSA input payload.
pub fn encode_get_lsa(offset: u32, length: u32, out: &mut [u8]) -> Result<(), DecodeError> {
    ensure_len(out, GET_LSA_LEN)?;
    out[0..4].copy_from_slice(&offset.to_le_bytes());
    out[4..8].copy_from_slice(&length.to_le_bytes());
    Ok(())
}

/// Reads a Get LSA input payload back as `(offset, length)`.
pub fn decode_get_lsa(raw: &[u8]) -> Result<(u32, u32), DecodeError> {
    ensure_len(raw, GET_LSA_LEN)?;
    Ok((read_u32(raw, 0), read_u32(raw, 4)))
}

/// Writes a Set LSA input payload: header followed by `data`.
pub fn encode_set_lsa(offset: u32, data: &[u8], out: &mut [u8]) -> Result<(), DecodeError> {
    ensure_len(out, SET_LSA_HEADER_LEN + data.len())?;
    out[0..4].copy_from_slice(&offset.to_le_bytes());
    out[4..8].fill(0);
    out[SET_LSA_HEADER_LEN..SET_LSA_HEADER_LEN + data.len()].copy_from_slice(data);
    Ok(())
}

/// Splits a Set LSA input payload into `(offset, data)`.
pub fn decode_set_lsa(raw: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    ensure_len(raw, SET_LSA_HEADER_LEN)?;
    Ok((read_u32(raw, 0), &raw[SET_LSA_HEADER_LEN..]))
}
