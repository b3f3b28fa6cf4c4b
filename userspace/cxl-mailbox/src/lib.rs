// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: CXL memory-device mailbox command engine
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + `tests/` (lifecycle scenarios, discovery, properties)
//!
//! PUBLIC API:
//!   - Context: memdev discovery over a sysfs-like registry
//!   - Memdev: device handle, lazily fetched capability catalog, label storage access
//!   - Catalog / QueryStatus: firmware-reported command table and per-command validation state
//!   - Command -> PreparedCommand -> Completed: one request/response unit
//!   - Transport / Channel: the blocking OS boundary (`DevTransport` on Linux, `sim` for hosts)
//!   - MboxStatus: firmware completion code decoder
//!
//! INVARIANTS:
//!   - Only a command validated against the device catalog reaches the transport
//!   - Every transport call is preceded by a devnode identity check
//!   - Caller-supplied buffers are borrowed, never owned or freed by the engine
//!   - No retries: transport failures and firmware codes are reported as they occur
//!
//! DEPENDENCIES:
//!   - cxl-abi: UAPI layout and wire views
//!   - thiserror: error enum
//!   - log: diagnostics facade
//!   - once_cell / parking_lot: catalog cache, simulated device state
//!   - serde / toml: configuration
//!   - libc: ioctl and errno values
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

#![deny(clippy::all, missing_docs)]

mod catalog;
mod command;
mod config;
mod context;
mod error;
mod memdev;
mod standard;
mod status;
pub mod sim;
pub mod sysfs;
pub mod transport;

pub use catalog::{Catalog, QueryStatus};
pub use command::{Command, Completed, PreparedCommand};
pub use config::{parse_log_priority, Config, ConfigError};
pub use context::Context;
pub use error::Error;
pub use memdev::{Memdev, MemdevAttributes};
pub use standard::{HealthInfo, Identify, LABEL_CHUNK_OVERHEAD};
pub use status::MboxStatus;
pub use transport::{Channel, DevNum, MailboxRequest, Transport};

#[cfg(target_os = "linux")]
pub use transport::DevTransport;

pub use cxl_abi::{CommandFlags, CommandId, CommandInfo};

/// Result alias used throughout the engine.
pub type Result<T> = core::result::Result<T, Error>;
