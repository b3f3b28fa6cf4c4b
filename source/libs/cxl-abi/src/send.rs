// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! `struct cxl_send_command`, the argument block of `CXL_MEM_SEND_COMMAND`.
//!
//! This is the one structure handed to the kernel by address, so it keeps the C layout. Payload
//! pointers travel as plain `u64` addresses; filling them is the transport's job.

use crate::command::CommandId;

/// Size of [`SendCommand`] as seen by the kernel.
pub const SEND_COMMAND_LEN: usize = 48;

/// One direction of payload: `{size, rsvd, payload}`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PayloadDesc {
    /// Buffer length in bytes. For output the kernel writes back the produced length.
    pub size: u32,
    /// Reserved, must be zero.
    pub rsvd: u32,
    /// User address of the buffer.
    pub payload: u64,
}

/// Argument block of `CXL_MEM_SEND_COMMAND`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendCommand {
    /// Kernel command id.
    pub id: u32,
    /// Must be zero.
    pub flags: u32,
    /// Opcode for [`CommandId::Raw`]; zero otherwise.
    pub raw_opcode: u16,
    /// Reserved, must be zero.
    pub raw_rsvd: u16,
    /// Mailbox return code written by the kernel.
    pub retval: u32,
    /// Input payload.
    pub input: PayloadDesc,
    /// Output payload.
    pub output: PayloadDesc,
}

const _: () = assert!(core::mem::size_of::<SendCommand>() == SEND_COMMAND_LEN);
const _: () = assert!(core::mem::size_of::<PayloadDesc>() == 16);

impl SendCommand {
    /// Argument block for a catalog command.
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            flags: 0,
            raw_opcode: 0,
            raw_rsvd: 0,
            retval: 0,
            input: PayloadDesc { size: 0, rsvd: 0, payload: 0 },
            output: PayloadDesc { size: 0, rsvd: 0, payload: 0 },
        }
    }

    /// Argument block for a raw opcode passthrough.
    pub const fn raw(opcode: u16) -> Self {
        let mut cmd = Self::new(CommandId::Raw as u32);
        cmd.raw_opcode = opcode;
        cmd
    }
}
