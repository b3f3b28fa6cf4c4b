// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Property tests for validation and buffer sizing
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 3 property tests
//!
//! TEST_SCOPE:
//!   - Ids absent from the catalog never reach the transport
//!   - Buffer overrides accepted exactly within [0, payload_max]
//!   - Catalog lookups return the first matching entry
//!
//! DEPENDENCIES:
//!   - proptest: generated catalogs, ids and sizes
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md
use std::sync::Arc;

use cxl_mailbox::sim::{SimDevice, SimTransport};
use cxl_mailbox::{Catalog, Command, CommandFlags, CommandInfo, DevNum, Error, Memdev};
use proptest::prelude::*;

fn memdev(ids: &[u32], payload_max: usize) -> (Arc<SimTransport>, Arc<Memdev>) {
    let sim = Arc::new(SimTransport::new());
    let mut device = SimDevice::new(DevNum::new(10, 3), payload_max);
    for id in ids {
        device.add_command(CommandInfo::new(*id, CommandFlags::ENABLED, 0, -1));
    }
    let attrs = device.attributes(0, "/dev/cxl/mem0");
    sim.insert("/dev/cxl/mem0", device);
    let memdev = Arc::new(Memdev::new(attrs, sim.clone()));
    (sim, memdev)
}

proptest! {
    #[test]
    fn absent_ids_are_unsupported(
        ids in proptest::collection::vec(0u32..64, 0..16),
        wanted in 0u32..128,
    ) {
        prop_assume!(!ids.contains(&wanted));
        let (sim, memdev) = memdev(&ids, 256);
        let mut cmd = Command::new(memdev, wanted);
        let is_unsupported = matches!(cmd.query(), Err(Error::Unsupported { id }) if id == wanted);
        prop_assert!(is_unsupported);
        let prepare_rejected = matches!(cmd.prepare(), Err(Error::Unsupported { .. }));
        prop_assert!(prepare_rejected);
        prop_assert_eq!(sim.sends(), 0);
    }

    #[test]
    fn buffer_overrides_respect_payload_max(payload_max in 1usize..4096, size in 0usize..8192) {
        let (sim, memdev) = memdev(&[1], payload_max);
        let mut cmd = Command::new(memdev, 1u32);
        let input = cmd.set_input_len(size);
        let output = cmd.set_output_len(size);
        if size <= payload_max {
            prop_assert!(input.is_ok() && output.is_ok());
            prop_assert_eq!(cmd.input_len(), size);
            prop_assert_eq!(cmd.output_len(), size);
        } else {
            let rejected = matches!(
                input,
                Err(Error::InvalidPayloadSize { requested, max }) if requested == size && max == payload_max
            );
            prop_assert!(rejected);
            prop_assert!(output.is_err());
            prop_assert_eq!(cmd.input_len(), 0);
            prop_assert_eq!(cmd.output_len(), 0);
        }
        prop_assert_eq!(sim.transport_calls(), 0);
    }

    #[test]
    fn lookup_returns_first_match(ids in proptest::collection::vec(0u32..8, 1..24)) {
        let entries: Vec<CommandInfo> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| CommandInfo::new(*id, CommandFlags::ENABLED, i as i32, 0))
            .collect();
        let catalog = Catalog::from_entries(entries);
        for id in &ids {
            let first = ids.iter().position(|candidate| candidate == id).unwrap();
            let (index, info) = catalog.find(*id).unwrap();
            prop_assert_eq!(index, first);
            prop_assert_eq!(info.size_in, first as i32);
        }
    }
}

#[test]
fn boundary_sizes() {
    let mut big = vec![0u8; 1025];
    let (_sim, memdev) = memdev(&[1], 1024);
    let mut cmd = Command::new(memdev, 1u32);
    assert!(cmd.set_output_len(0).is_ok());
    assert!(cmd.set_output_len(1024).is_ok());
    assert!(matches!(
        cmd.set_output(&mut big),
        Err(Error::InvalidPayloadSize { requested: 1025, max: 1024 })
    ));
    assert_eq!(cmd.output_len(), 1024);
}
