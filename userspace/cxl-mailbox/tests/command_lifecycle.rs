// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: End-to-end command lifecycle against emulated memdevs
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 15 integration tests
//!
//! TEST_SCOPE:
//!   - Validation against the device catalog (supported, unsupported, not run)
//!   - Buffer sizing from catalog entries and caller overrides
//!   - Devnode identity check before every transport call
//!   - Catalog caching and fetch failure handling
//!   - Completion decoding and buffer ownership
//!
//! DEPENDENCIES:
//!   - cxl_mailbox::sim: emulated transport with call counters
//!   - ScriptedTransport: fixed query replies for malformed devices
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cxl_abi::query::{decode_query_count, COMMAND_INFO_LEN, QUERY_HEADER_LEN};
use cxl_mailbox::sim::{QueryPhase, SimDevice, SimTransport};
use cxl_mailbox::{
    Channel, Command, CommandFlags, CommandId, CommandInfo, DevNum, Error, MailboxRequest,
    MboxStatus, Memdev, MemdevAttributes, QueryStatus, Transport,
};

const DEVNODE: &str = "/dev/cxl/mem0";

fn setup(device: SimDevice) -> (Arc<SimTransport>, Arc<Memdev>) {
    let sim = Arc::new(SimTransport::new());
    let attrs = device.attributes(0, DEVNODE);
    sim.insert(DEVNODE, device);
    let memdev = Arc::new(Memdev::new(attrs, sim.clone()));
    (sim, memdev)
}

fn device_with(entries: &[(u32, i32, i32)], payload_max: usize) -> SimDevice {
    let mut device = SimDevice::new(DevNum::new(10, 3), payload_max);
    for (id, size_in, size_out) in entries {
        device.add_command(CommandInfo::new(*id, CommandFlags::ENABLED, *size_in, *size_out));
    }
    device
}

#[test]
fn unsupported_command_is_rejected_locally() {
    let (sim, memdev) = setup(device_with(&[(5, 4, 8)], 256));
    let mut cmd = Command::new(memdev, 9u32);
    let err = cmd.query().unwrap_err();
    assert!(matches!(err, Error::Unsupported { id: 9 }));
    assert_eq!(cmd.status(), QueryStatus::Unsupported);
    // Only the two catalog queries reached the device.
    assert_eq!(sim.queries(), 2);
    assert_eq!(sim.sends(), 0);
    assert!(matches!(cmd.prepare(), Err(Error::Unsupported { id: 9 })));
    assert_eq!(sim.sends(), 0);
}

#[test]
fn variable_output_gets_payload_max() {
    let (sim, memdev) = setup(device_with(&[(12, 0, -1)], 1024));
    let mut cmd = Command::new(memdev, 12u32);
    cmd.query().unwrap();
    cmd.allocate().unwrap();
    assert_eq!(cmd.output_len(), 1024);
    assert_eq!(cmd.input_len(), 0);
    let done = cmd.prepare().unwrap().submit().unwrap();
    assert_eq!(done.mbox_status(), MboxStatus::Success);
    assert_eq!(sim.sends(), 1);
}

#[test]
fn device_mismatch_sends_nothing() {
    let mut device = device_with(&[(5, 4, 8)], 256);
    device.report_devnum(Some(DevNum::new(10, 4)));
    let (sim, memdev) = setup(device);
    let mut cmd = Command::new(memdev, 5u32);
    match cmd.query().unwrap_err() {
        Error::DeviceMismatch { expected, found, .. } => {
            assert_eq!(expected, DevNum::new(10, 3));
            assert_eq!(found, Some(DevNum::new(10, 4)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.transport_calls(), 0);
    assert_eq!(cmd.status(), QueryStatus::NotRun);
}

#[test]
fn non_character_devnode_is_a_mismatch() {
    let mut device = device_with(&[(5, 4, 8)], 256);
    device.report_devnum(None);
    let (sim, memdev) = setup(device);
    let err = memdev.catalog().unwrap_err();
    assert!(matches!(err, Error::DeviceMismatch { found: None, .. }));
    assert_eq!(sim.transport_calls(), 0);
}

#[test]
fn mismatch_after_validation_blocks_submit() {
    let (sim, memdev) = setup(device_with(&[(5, 4, 8)], 256));
    let mut cmd = Command::new(memdev, 5u32);
    cmd.query().unwrap();
    sim.with_device(DEVNODE, |device| device.report_devnum(Some(DevNum::new(10, 9))));
    let err = cmd.prepare().unwrap().submit().unwrap_err();
    assert!(matches!(err, Error::DeviceMismatch { .. }));
    assert_eq!(sim.sends(), 0);
}

#[test]
fn catalog_is_fetched_once() {
    let (sim, memdev) = setup(device_with(&[(5, 4, 8), (7, 0, 18)], 256));
    let first = memdev.catalog().unwrap();
    let second = memdev.catalog().unwrap();
    assert_eq!(*first, *second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sim.queries(), 2);

    let mut cmd = Command::new(Arc::clone(&memdev), 7u32);
    cmd.query().unwrap();
    cmd.query().unwrap();
    assert_eq!(sim.queries(), 2);
    assert_eq!(memdev.supported_commands().unwrap().len(), 2);
}

#[test]
fn failed_fetch_is_not_cached() {
    let mut device = device_with(&[(5, 4, 8)], 256);
    device.fail_query(Some(QueryPhase::Entries));
    let (sim, memdev) = setup(device);
    let mut cmd = Command::new(Arc::clone(&memdev), 5u32);
    assert!(matches!(cmd.query(), Err(Error::Transport { .. })));
    assert_eq!(cmd.status(), QueryStatus::NotRun);
    assert!(memdev.cached_catalog().is_none());

    sim.with_device(DEVNODE, |device| device.fail_query(None));
    cmd.query().unwrap();
    assert!(matches!(cmd.status(), QueryStatus::Supported { index: 0, .. }));
}

#[test]
fn failed_count_phase_is_not_cached() {
    let mut device = device_with(&[(5, 4, 8)], 256);
    device.fail_query(Some(QueryPhase::Count));
    let (sim, memdev) = setup(device);
    let mut cmd = Command::new(Arc::clone(&memdev), 5u32);
    assert!(matches!(cmd.query(), Err(Error::Transport { .. })));
    assert_eq!(cmd.status(), QueryStatus::NotRun);
    assert!(memdev.cached_catalog().is_none());
    assert_eq!(sim.queries(), 1);

    sim.with_device(DEVNODE, |device| device.fail_query(None));
    cmd.query().unwrap();
    assert_eq!(memdev.cached_catalog().unwrap().len(), 1);
}

/// Device whose count reply and descriptor reply are scripted independently.
struct ScriptedTransport {
    count: u32,
    entries: Vec<CommandInfo>,
    queries: AtomicUsize,
}

impl ScriptedTransport {
    fn new(count: u32, entries: Vec<CommandInfo>) -> Self {
        Self { count, entries, queries: AtomicUsize::new(0) }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, _devnode: &Path) -> io::Result<Box<dyn Channel + '_>> {
        Ok(Box::new(ScriptedChannel(self)))
    }
}

struct ScriptedChannel<'a>(&'a ScriptedTransport);

impl Channel for ScriptedChannel<'_> {
    fn device_number(&self) -> io::Result<Option<DevNum>> {
        Ok(Some(DevNum::new(10, 3)))
    }

    fn query_commands(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.0.queries.fetch_add(1, Ordering::SeqCst);
        if decode_query_count(buf).unwrap() == 0 {
            buf[0..4].copy_from_slice(&self.0.count.to_le_bytes());
            return Ok(());
        }
        // Reports its own descriptor count, writing only what fits.
        let reported = self.0.entries.len() as u32;
        buf[0..4].copy_from_slice(&reported.to_le_bytes());
        let room = (buf.len() - QUERY_HEADER_LEN) / COMMAND_INFO_LEN;
        for (i, info) in self.0.entries.iter().take(room).enumerate() {
            info.encode(&mut buf[QUERY_HEADER_LEN + i * COMMAND_INFO_LEN..]).unwrap();
        }
        Ok(())
    }

    fn send_command(&mut self, _request: &mut MailboxRequest<'_>) -> io::Result<()> {
        Err(io::Error::from_raw_os_error(libc::ENOTTY))
    }
}

fn scripted(count: u32, ids: &[u32]) -> (Arc<ScriptedTransport>, Arc<Memdev>) {
    let entries =
        ids.iter().map(|id| CommandInfo::new(*id, CommandFlags::ENABLED, 0, 0)).collect();
    let transport = Arc::new(ScriptedTransport::new(count, entries));
    let attrs = MemdevAttributes {
        id: 0,
        devnode: PathBuf::from(DEVNODE),
        devnum: DevNum::new(10, 3),
        payload_max: 256,
        lsa_size: 0,
        firmware_version: String::new(),
        pmem_size: 0,
        ram_size: 0,
        serial: None,
        numa_node: None,
    };
    let memdev = Arc::new(Memdev::new(attrs, transport.clone()));
    (transport, memdev)
}

#[test]
fn absurd_command_count_is_an_error() {
    let (transport, memdev) = scripted(u32::MAX, &[]);
    let err = memdev.catalog().unwrap_err();
    assert!(matches!(err, Error::Transport { .. }), "{err}");
    assert!(memdev.cached_catalog().is_none());
    // Rejected before the descriptor phase.
    assert_eq!(transport.queries.load(Ordering::SeqCst), 1);
}

#[test]
fn shrinking_catalog_uses_the_smaller_count() {
    let (transport, memdev) = scripted(3, &[1, 7]);
    let catalog = memdev.catalog().unwrap();
    let ids: Vec<u32> = catalog.iter().map(|info| info.id).collect();
    assert_eq!(ids, [1, 7]);
    assert_eq!(transport.queries.load(Ordering::SeqCst), 2);
}

#[test]
fn growing_catalog_is_capped_at_the_sized_count() {
    let (_transport, memdev) = scripted(2, &[1, 7, 12, 15]);
    let catalog = memdev.catalog().unwrap();
    let ids: Vec<u32> = catalog.iter().map(|info| info.id).collect();
    assert_eq!(ids, [1, 7]);
    let mut cmd = Command::new(memdev, 12u32);
    assert!(matches!(cmd.query(), Err(Error::Unsupported { id: 12 })));
}

#[test]
fn firmware_status_is_distinct_from_transport_failure() {
    let (sim, memdev) = setup(device_with(&[(5, 4, 8)], 256));
    sim.with_device(DEVNODE, |device| device.respond_with(5, MboxStatus::RetryRequired, Vec::new()));
    let mut cmd = Command::new(Arc::clone(&memdev), 5u32);
    cmd.query().unwrap();
    let err = cmd.prepare().unwrap().submit().unwrap_err();
    let status = err.mbox_status().unwrap();
    assert!(status.is_retryable());
    assert_eq!(sim.sends(), 1);

    // Wrong fixed input length: rejected by the driver, not by firmware.
    let mut cmd = Command::new(memdev, 5u32);
    cmd.set_input_len(3).unwrap();
    cmd.query().unwrap();
    let err = cmd.prepare().unwrap().submit().unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(err.mbox_status(), None);
}

#[test]
fn completion_output_is_trimmed_to_out_size() {
    let (sim, memdev) = setup(device_with(&[(5, 4, 8)], 256));
    sim.with_device(DEVNODE, |device| {
        device.respond_with(5, MboxStatus::Success, vec![0xaa, 0xbb, 0xcc])
    });
    let mut cmd = Command::new(memdev, 5u32);
    cmd.query().unwrap();
    let done = cmd.prepare().unwrap().submit().unwrap();
    assert_eq!(done.out_size(), 3);
    assert_eq!(done.output(), &[0xaa, 0xbb, 0xcc]);
    assert_eq!(done.into_output(), vec![0xaa, 0xbb, 0xcc]);
}

#[test]
fn caller_buffers_outlive_the_command() {
    let (sim, memdev) = setup(SimDevice::standard(DevNum::new(10, 3), 256, 0));
    sim.with_device(DEVNODE, |device| {
        device.respond_to_raw(0x4000, MboxStatus::Success, b"raw reply".to_vec())
    });
    let request = [0u8; 2];
    let mut reply = vec![0u8; 32];
    {
        let mut cmd = Command::raw(Arc::clone(&memdev), 0x4000);
        cmd.set_input(&request).unwrap();
        cmd.set_output(&mut reply).unwrap();
        cmd.query().unwrap();
        let done = cmd.prepare().unwrap().submit().unwrap();
        assert_eq!(done.out_size(), 9);
    }
    assert_eq!(&reply[..9], b"raw reply");
    assert_eq!(request, [0u8; 2]);
}

#[test]
fn memdev_references_are_released() {
    let (_sim, memdev) = setup(device_with(&[(5, 4, 8)], 256));
    let commands: Vec<Command<'static>> =
        (0..4).map(|_| Command::new(Arc::clone(&memdev), CommandId::GetPartitionInfo)).collect();
    assert_eq!(Arc::strong_count(&memdev), 5);
    drop(commands);
    assert_eq!(Arc::strong_count(&memdev), 1);
}
