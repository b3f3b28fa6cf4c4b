// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! ioctl request numbers for the CXL memdev character device.
//!
//! Encoded with the generic Linux `_IOC` layout (x86, arm64, riscv). Architectures with a
//! different direction-bit layout (powerpc, mips, sparc) are not covered.

use crate::query::QUERY_HEADER_LEN;
use crate::send::SEND_COMMAND_LEN;

/// ioctl "type" byte reserved for CXL memdevs.
pub const CXL_IOCTL_TYPE: u8 = 0xCE;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_SIZEMASK: u32 = (1 << 14) - 1;

/// Direction bit: userspace writes the argument.
pub const IOC_WRITE: u32 = 1;
/// Direction bit: userspace reads the argument.
pub const IOC_READ: u32 = 2;

/// Builds an ioctl request number (`_IOC(dir, type, nr, size)`).
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | (((size as u32) & IOC_SIZEMASK) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
}

/// `_IOR(0xCE, 1, struct cxl_mem_query_commands)`.
pub const CXL_MEM_QUERY_COMMANDS: u32 = ioc(IOC_READ, CXL_IOCTL_TYPE, 1, QUERY_HEADER_LEN);

/// `_IOWR(0xCE, 2, struct cxl_send_command)`.
pub const CXL_MEM_SEND_COMMAND: u32 =
    ioc(IOC_READ | IOC_WRITE, CXL_IOCTL_TYPE, 2, SEND_COMMAND_LEN);
