// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-process memdev emulation for host-based testing
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - struct SimTransport: Transport over a table of emulated devnodes, with call counters
//!   - struct SimDevice: catalog, built-in handlers, label storage, canned replies
//!   - SimDevice::standard(): device advertising the commands the engine's helpers use
//!   - demo_context(): two-device context used by the admin tool's `--sim` mode
//!
//! INVARIANTS:
//!   - Validates requests the way the kernel does (catalog membership, payload sizes)
//!   - Counts only query and send calls as transport calls; opens are counted separately
//!
//! DEPENDENCIES:
//!   - parking_lot::Mutex: device table
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cxl_abi::payload::{decode_get_lsa, decode_set_lsa, CAPACITY_MULTIPLIER, HEALTH_INFO_LEN, IDENTIFY_LEN};
use cxl_abi::query::{checked_query_count, COMMAND_INFO_LEN, QUERY_HEADER_LEN};
use cxl_abi::{CommandFlags, CommandId, CommandInfo};
use parking_lot::Mutex;

use crate::config::Config;
use crate::context::Context;
use crate::memdev::MemdevAttributes;
use crate::status::MboxStatus;
use crate::transport::{Channel, DevNum, MailboxRequest, Transport};

/// Query phase selected for failure injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPhase {
    /// The zero-entry count request.
    Count,
    /// The sized descriptor request.
    Entries,
}

#[derive(Clone, Debug)]
struct Canned {
    status: MboxStatus,
    payload: Vec<u8>,
}

/// One emulated memory device.
#[derive(Clone, Debug)]
pub struct SimDevice {
    devnum: DevNum,
    reported: Option<Option<DevNum>>,
    payload_max: usize,
    catalog: Vec<CommandInfo>,
    label: Vec<u8>,
    firmware_version: String,
    canned: HashMap<(u32, u16), Canned>,
    fail_query: Option<QueryPhase>,
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

impl SimDevice {
    /// Device with an empty catalog and no label storage.
    pub fn new(devnum: DevNum, payload_max: usize) -> Self {
        Self {
            devnum,
            reported: None,
            payload_max,
            catalog: Vec::new(),
            label: Vec::new(),
            firmware_version: "sim-1.0".to_string(),
            canned: HashMap::new(),
            fail_query: None,
        }
    }

    /// Device advertising Identify, raw, firmware info, partition info, label access, health
    /// and timestamp.
    pub fn standard(devnum: DevNum, payload_max: usize, lsa_size: usize) -> Self {
        let mut device = Self::new(devnum, payload_max);
        let variable = cxl_abi::query::VARIABLE_PAYLOAD;
        for (id, size_in, size_out) in [
            (CommandId::Identify, 0, IDENTIFY_LEN as i32),
            (CommandId::Raw, variable, variable),
            (CommandId::GetFwInfo, 0, 0x50),
            (CommandId::GetPartitionInfo, 0, 0x20),
            (CommandId::GetLsa, 0x8, variable),
            (CommandId::GetHealthInfo, 0, HEALTH_INFO_LEN as i32),
            (CommandId::SetLsa, variable, 0),
            (CommandId::GetTimestamp, 0, 0x8),
        ] {
            device.add_command(CommandInfo::new(id as u32, CommandFlags::ENABLED, size_in, size_out));
        }
        device.label = vec![0; lsa_size];
        device
    }

    /// Appends a catalog entry.
    pub fn add_command(&mut self, info: CommandInfo) {
        self.catalog.push(info);
    }

    /// Replies to kernel id `id` with `status` and `payload` instead of the built-in handler.
    pub fn respond_with(&mut self, id: u32, status: MboxStatus, payload: Vec<u8>) {
        self.canned.insert((id, 0), Canned { status, payload });
    }

    /// Replies to raw `opcode` with `status` and `payload`.
    pub fn respond_to_raw(&mut self, opcode: u16, status: MboxStatus, payload: Vec<u8>) {
        self.canned.insert((CommandId::Raw as u32, opcode), Canned { status, payload });
    }

    /// Makes the devnode report `devnum` (or a non-character device for `None`).
    pub fn report_devnum(&mut self, devnum: Option<DevNum>) {
        self.reported = Some(devnum);
    }

    /// Fails the given query phase with `EIO`; `None` clears the injection.
    pub fn fail_query(&mut self, phase: Option<QueryPhase>) {
        self.fail_query = phase;
    }

    /// Label storage contents.
    pub fn label(&self) -> &[u8] {
        &self.label
    }

    /// Attributes discovery would report for this device as `memN` at `devnode`.
    pub fn attributes(&self, id: u32, devnode: impl Into<PathBuf>) -> MemdevAttributes {
        MemdevAttributes {
            id,
            devnode: devnode.into(),
            devnum: self.devnum,
            payload_max: self.payload_max,
            lsa_size: self.label.len(),
            firmware_version: self.firmware_version.clone(),
            pmem_size: 0,
            ram_size: 4 * CAPACITY_MULTIPLIER,
            serial: Some(0x5eed_0000 + u64::from(id)),
            numa_node: None,
        }
    }

    fn device_number(&self) -> Option<DevNum> {
        self.reported.unwrap_or(Some(self.devnum))
    }

    fn query(&self, buf: &mut [u8]) -> io::Result<()> {
        let requested = checked_query_count(buf).map_err(|_| errno(libc::EINVAL))?;
        let phase = if requested == 0 { QueryPhase::Count } else { QueryPhase::Entries };
        if self.fail_query == Some(phase) {
            return Err(errno(libc::EIO));
        }
        if requested == 0 {
            let total = u32::try_from(self.catalog.len()).map_err(|_| errno(libc::EOVERFLOW))?;
            buf[0..4].copy_from_slice(&total.to_le_bytes());
            return Ok(());
        }
        for (i, info) in self.catalog.iter().take(requested as usize).enumerate() {
            let at = QUERY_HEADER_LEN + i * COMMAND_INFO_LEN;
            info.encode(&mut buf[at..]).map_err(|_| errno(libc::EFAULT))?;
        }
        Ok(())
    }

    fn validate(&self, request: &MailboxRequest<'_>) -> io::Result<()> {
        let info = self
            .catalog
            .iter()
            .find(|info| info.id == request.id)
            .ok_or_else(|| errno(libc::ENOTTY))?;
        if request.input.len() > self.payload_max || request.output.len() > self.payload_max {
            return Err(errno(libc::EINVAL));
        }
        if let Some(size_in) = info.input_len() {
            if request.input.len() != size_in {
                return Err(errno(libc::ENOMEM));
            }
        }
        if let Some(size_out) = info.output_len() {
            if request.output.len() < size_out {
                return Err(errno(libc::ENOMEM));
            }
        }
        Ok(())
    }

    fn reply(request: &mut MailboxRequest<'_>, status: MboxStatus, payload: &[u8]) {
        let n = payload.len().min(request.output.len());
        request.output[..n].copy_from_slice(&payload[..n]);
        request.retval = status.code();
        request.out_size = if status.is_success() { n } else { 0 };
    }

    fn identify_payload(&self) -> Vec<u8> {
        let mut out = vec![0u8; IDENTIFY_LEN];
        let rev = self.firmware_version.as_bytes();
        let n = rev.len().min(16);
        out[..n].copy_from_slice(&rev[..n]);
        out[16..24].copy_from_slice(&4u64.to_le_bytes());
        out[24..32].copy_from_slice(&4u64.to_le_bytes());
        out[40..48].copy_from_slice(&1u64.to_le_bytes());
        for log in out[48..56].chunks_exact_mut(2) {
            log.copy_from_slice(&0x400u16.to_le_bytes());
        }
        let lsa = u32::try_from(self.label.len()).unwrap_or(u32::MAX);
        out[56..60].copy_from_slice(&lsa.to_le_bytes());
        out[60..63].copy_from_slice(&[0x00, 0x01, 0x00]);
        out[63..65].copy_from_slice(&8u16.to_le_bytes());
        out[65] = 0x01;
        out
    }

    fn health_payload() -> Vec<u8> {
        let mut out = vec![0u8; HEALTH_INFO_LEN];
        out[3] = 3;
        out[4..6].copy_from_slice(&35i16.to_le_bytes());
        out
    }

    fn send(&mut self, request: &mut MailboxRequest<'_>) -> io::Result<()> {
        self.validate(request)?;
        if let Some(canned) = self.canned.get(&(request.id, request.raw_opcode)) {
            Self::reply(request, canned.status, &canned.payload);
            return Ok(());
        }
        match CommandId::from_raw(request.id) {
            Some(CommandId::Identify) => {
                let payload = self.identify_payload();
                Self::reply(request, MboxStatus::Success, &payload);
            }
            Some(CommandId::GetHealthInfo) => {
                Self::reply(request, MboxStatus::Success, &Self::health_payload());
            }
            Some(CommandId::GetLsa) => {
                let range = decode_get_lsa(request.input).ok().and_then(|(offset, len)| {
                    let start = offset as usize;
                    let end = start.checked_add(len as usize)?;
                    (end <= self.label.len() && len as usize <= request.output.len())
                        .then_some(start..end)
                });
                match range {
                    Some(range) => {
                        let data = self.label[range].to_vec();
                        Self::reply(request, MboxStatus::Success, &data);
                    }
                    None => Self::reply(request, MboxStatus::InvalidInput, &[]),
                }
            }
            Some(CommandId::SetLsa) => {
                let written = decode_set_lsa(request.input).ok().and_then(|(offset, data)| {
                    let start = offset as usize;
                    let end = start.checked_add(data.len())?;
                    let slot = self.label.get_mut(start..end)?;
                    slot.copy_from_slice(data);
                    Some(())
                });
                let status = if written.is_some() { MboxStatus::Success } else { MboxStatus::InvalidInput };
                Self::reply(request, status, &[]);
            }
            Some(CommandId::Raw) => Self::reply(request, MboxStatus::Unsupported, &[]),
            _ => Self::reply(request, MboxStatus::Success, &[]),
        }
        Ok(())
    }
}

/// Transport over emulated devnodes.
#[derive(Debug, Default)]
pub struct SimTransport {
    devices: Mutex<HashMap<PathBuf, SimDevice>>,
    opens: AtomicUsize,
    queries: AtomicUsize,
    sends: AtomicUsize,
}

impl SimTransport {
    /// Transport with no devnodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `device` at `devnode`, replacing any previous one.
    pub fn insert(&self, devnode: impl Into<PathBuf>, device: SimDevice) {
        self.devices.lock().insert(devnode.into(), device);
    }

    /// Runs `f` on the device at `devnode`.
    pub fn with_device<R>(&self, devnode: impl AsRef<Path>, f: impl FnOnce(&mut SimDevice) -> R) -> Option<R> {
        self.devices.lock().get_mut(devnode.as_ref()).map(f)
    }

    /// Devnode opens so far.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Query calls so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Send calls so far.
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Query and send calls so far.
    pub fn transport_calls(&self) -> usize {
        self.queries() + self.sends()
    }
}

impl Transport for SimTransport {
    fn open(&self, devnode: &Path) -> io::Result<Box<dyn Channel + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.devices.lock().contains_key(devnode) {
            return Err(errno(libc::ENOENT));
        }
        Ok(Box::new(SimChannel { sim: self, devnode: devnode.to_path_buf() }))
    }
}

struct SimChannel<'a> {
    sim: &'a SimTransport,
    devnode: PathBuf,
}

impl SimChannel<'_> {
    fn with_device<R>(&self, f: impl FnOnce(&mut SimDevice) -> io::Result<R>) -> io::Result<R> {
        let mut devices = self.sim.devices.lock();
        let device = devices.get_mut(&self.devnode).ok_or_else(|| errno(libc::ENODEV))?;
        f(device)
    }
}

impl Channel for SimChannel<'_> {
    fn device_number(&self) -> io::Result<Option<DevNum>> {
        self.with_device(|device| Ok(device.device_number()))
    }

    fn query_commands(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.sim.queries.fetch_add(1, Ordering::SeqCst);
        self.with_device(|device| device.query(buf))
    }

    fn send_command(&mut self, request: &mut MailboxRequest<'_>) -> io::Result<()> {
        self.sim.sends.fetch_add(1, Ordering::SeqCst);
        self.with_device(|device| device.send(request))
    }
}

/// Context over two emulated devices, `mem0` and `mem1`.
pub fn demo_context(config: Config) -> Context {
    let sim = Arc::new(SimTransport::new());
    let mut attrs = Vec::new();
    for (id, minor, payload_max, lsa_size) in [(0u32, 0u32, 4096usize, 0x2_0000usize), (1, 1, 1024, 0x1000)] {
        let devnode = config.devnode(&format!("mem{id}"));
        let device = SimDevice::standard(DevNum::new(251, minor), payload_max, lsa_size);
        attrs.push(device.attributes(id, devnode.clone()));
        sim.insert(devnode, device);
    }
    Context::from_attributes(config, sim, attrs)
}
