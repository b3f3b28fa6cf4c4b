// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Standard commands built on the generic lifecycle: Identify, Get Health Info and label
//! storage area access.

use std::sync::Arc;

use cxl_abi::payload::{
    encode_get_lsa, encode_set_lsa, HealthInfoView, HealthStatus, IdentifyView, GET_LSA_LEN,
    SET_LSA_HEADER_LEN,
};
use cxl_abi::CommandId;

use crate::command::Command;
use crate::memdev::Memdev;
use crate::{Error, Result};

/// Bytes of each label transfer taken by the command header.
pub const LABEL_CHUNK_OVERHEAD: usize = SET_LSA_HEADER_LEN;

/// Decoded Identify Memory Device reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identify {
    /// Firmware revision.
    pub fw_revision: String,
    /// Total capacity in bytes.
    pub total_capacity: u64,
    /// Volatile-only capacity in bytes.
    pub volatile_only_capacity: u64,
    /// Persistent-only capacity in bytes.
    pub persistent_only_capacity: u64,
    /// Partition alignment in bytes.
    pub partition_align: u64,
    /// Event log sizes: informational, warning, failure, fatal.
    pub event_log_sizes: [u16; 4],
    /// Label storage area size.
    pub lsa_size: u32,
    /// Poison list capacity in records.
    pub poison_list_max_records: u32,
    /// Concurrent poison injection limit.
    pub inject_poison_limit: u16,
    /// Poison handling capability bits.
    pub poison_caps: u8,
    /// QoS telemetry capability bits.
    pub qos_telemetry_caps: u8,
}

impl From<IdentifyView<'_>> for Identify {
    fn from(view: IdentifyView<'_>) -> Self {
        Self {
            fw_revision: String::from_utf8_lossy(view.fw_revision()).into_owned(),
            total_capacity: view.total_capacity(),
            volatile_only_capacity: view.volatile_only_capacity(),
            persistent_only_capacity: view.persistent_only_capacity(),
            partition_align: view.partition_align(),
            event_log_sizes: view.event_log_sizes(),
            lsa_size: view.lsa_size(),
            poison_list_max_records: view.poison_list_max_records(),
            inject_poison_limit: view.inject_poison_limit(),
            poison_caps: view.poison_caps(),
            qos_telemetry_caps: view.qos_telemetry_caps(),
        }
    }
}

/// Decoded Get Health Info reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthInfo {
    /// Health status bits.
    pub health_status: HealthStatus,
    /// Media status code.
    pub media_status: u8,
    /// Additional status bits.
    pub ext_status: u8,
    /// Percentage of life used.
    pub life_used: u8,
    /// Temperature in degrees Celsius.
    pub temperature: i16,
    /// Dirty shutdown count.
    pub dirty_shutdowns: u32,
    /// Corrected volatile errors.
    pub volatile_errors: u32,
    /// Corrected persistent errors.
    pub pmem_errors: u32,
}

impl From<HealthInfoView<'_>> for HealthInfo {
    fn from(view: HealthInfoView<'_>) -> Self {
        Self {
            health_status: view.health_status(),
            media_status: view.media_status(),
            ext_status: view.ext_status(),
            life_used: view.life_used(),
            temperature: view.temperature(),
            dirty_shutdowns: view.dirty_shutdowns(),
            volatile_errors: view.volatile_errors(),
            pmem_errors: view.pmem_errors(),
        }
    }
}

fn run_fixed(memdev: &Arc<Memdev>, id: CommandId) -> Result<Vec<u8>> {
    let mut cmd = Command::new(Arc::clone(memdev), id);
    cmd.query()?;
    Ok(cmd.prepare()?.submit()?.into_output())
}

fn offset_u32(offset: usize, len: usize, size: usize) -> Result<u32> {
    u32::try_from(offset).map_err(|_| Error::LabelRange { offset, len, size })
}

impl Memdev {
    /// Issues Identify Memory Device.
    pub fn identify(self: &Arc<Self>) -> Result<Identify> {
        let reply = run_fixed(self, CommandId::Identify)?;
        let view = IdentifyView::new(&reply).map_err(Error::truncated("identify reply"))?;
        Ok(view.into())
    }

    /// Issues Get Health Info.
    pub fn health_info(self: &Arc<Self>) -> Result<HealthInfo> {
        let reply = run_fixed(self, CommandId::GetHealthInfo)?;
        let view = HealthInfoView::new(&reply).map_err(Error::truncated("health info reply"))?;
        Ok(view.into())
    }

    fn check_label_range(&self, offset: usize, len: usize) -> Result<()> {
        let size = self.lsa_size();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Error::LabelRange { offset, len, size }),
        }
    }

    fn label_chunk(&self) -> Result<usize> {
        let max = self.payload_max();
        match max.checked_sub(LABEL_CHUNK_OVERHEAD) {
            Some(chunk) if chunk > 0 => Ok(chunk),
            _ => Err(Error::InvalidPayloadSize { requested: LABEL_CHUNK_OVERHEAD + 1, max }),
        }
    }

    /// Reads `buf.len()` bytes of label storage starting at `offset`.
    pub fn read_label(self: &Arc<Self>, buf: &mut [u8], offset: usize) -> Result<()> {
        self.check_label_range(offset, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let chunk = self.label_chunk()?;
        let size = self.lsa_size();
        let mut at = offset;
        for piece in buf.chunks_mut(chunk) {
            let len = piece.len();
            let mut input = vec![0u8; GET_LSA_LEN];
            encode_get_lsa(offset_u32(at, len, size)?, offset_u32(len, len, size)?, &mut input)?;
            let mut cmd = Command::new(Arc::clone(self), CommandId::GetLsa);
            cmd.query()?;
            cmd.set_input_vec(input)?;
            cmd.set_output(piece)?;
            let done = cmd.prepare()?.submit()?;
            if done.out_size() < len {
                return Err(Error::Truncated { what: "label read", need: len, have: done.out_size() });
            }
            at += len;
        }
        log::debug!("{}: read {} label bytes at {offset}", self.name(), buf.len());
        Ok(())
    }

    /// Writes `data` into label storage starting at `offset`.
    pub fn write_label(self: &Arc<Self>, data: &[u8], offset: usize) -> Result<()> {
        self.check_label_range(offset, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let chunk = self.label_chunk()?;
        let size = self.lsa_size();
        let mut at = offset;
        for piece in data.chunks(chunk) {
            let mut input = vec![0u8; SET_LSA_HEADER_LEN + piece.len()];
            encode_set_lsa(offset_u32(at, piece.len(), size)?, piece, &mut input)?;
            let mut cmd = Command::new(Arc::clone(self), CommandId::SetLsa);
            cmd.query()?;
            cmd.set_input_vec(input)?;
            cmd.prepare()?.submit()?;
            at += piece.len();
        }
        log::debug!("{}: wrote {} label bytes at {offset}", self.name(), data.len());
        Ok(())
    }

    /// Zeroes `len` bytes of label storage starting at `offset`.
    pub fn zero_label(self: &Arc<Self>, len: usize, offset: usize) -> Result<()> {
        self.check_label_range(offset, len)?;
        if len == 0 {
            return Ok(());
        }
        let zeros = vec![0u8; self.label_chunk()?.min(len)];
        let mut at = offset;
        let end = offset + len;
        while at < end {
            let step = zeros.len().min(end - at);
            self.write_label(&zeros[..step], at)?;
            at += step;
        }
        Ok(())
    }
}
