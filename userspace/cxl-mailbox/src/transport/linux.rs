// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Linux devnode transport: `open(2)` + `ioctl(2)` on `/dev/cxl/memN`.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use cxl_abi::ioctl::{CXL_MEM_QUERY_COMMANDS, CXL_MEM_SEND_COMMAND};
use cxl_abi::query::checked_query_count;
use cxl_abi::{CommandId, SendCommand};

use super::{Channel, DevNum, MailboxRequest, Transport};

/// Transport backed by the kernel memdev driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct DevTransport;

impl Transport for DevTransport {
    fn open(&self, devnode: &Path) -> io::Result<Box<dyn Channel + '_>> {
        let file = OpenOptions::new().read(true).write(true).open(devnode)?;
        Ok(Box::new(DevChannel { file }))
    }
}

struct DevChannel {
    file: File,
}

fn payload_len(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::from_raw_os_error(libc::E2BIG))
}

impl Channel for DevChannel {
    fn device_number(&self) -> io::Result<Option<DevNum>> {
        let meta = self.file.metadata()?;
        if !meta.file_type().is_char_device() {
            return Ok(None);
        }
        let rdev = meta.rdev();
        Ok(Some(DevNum::new(libc::major(rdev), libc::minor(rdev))))
    }

    fn query_commands(&mut self, buf: &mut [u8]) -> io::Result<()> {
        checked_query_count(buf).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
        // SAFETY: `buf` is a live, exclusively borrowed buffer. The kernel writes the header plus
        // at most the descriptor count stored in it, and `checked_query_count` has verified that
        // `buf` holds that many descriptors.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), CXL_MEM_QUERY_COMMANDS as _, buf.as_mut_ptr())
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn send_command(&mut self, request: &mut MailboxRequest<'_>) -> io::Result<()> {
        let mut cmd = if request.id == CommandId::Raw as u32 {
            SendCommand::raw(request.raw_opcode)
        } else {
            SendCommand::new(request.id)
        };
        cmd.input.size = payload_len(request.input.len())?;
        cmd.input.payload = request.input.as_ptr() as u64;
        cmd.output.size = payload_len(request.output.len())?;
        cmd.output.payload = request.output.as_mut_ptr() as u64;
        // SAFETY: `cmd` is `#[repr(C)]` and matches `struct cxl_send_command`; both payload
        // addresses point into buffers borrowed by `request` for the duration of the call, and
        // their sizes are the buffer lengths.
        let rc = unsafe {
            libc::ioctl(self.file.as_raw_fd(), CXL_MEM_SEND_COMMAND as _, &mut cmd as *mut SendCommand)
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        request.retval = cmd.retval;
        request.out_size = (cmd.output.size as usize).min(request.output.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxl_abi::query::{encode_query_header, QUERY_HEADER_LEN};

    #[test]
    fn undersized_query_buffer_never_reaches_the_driver() {
        let mut channel = DevTransport.open(Path::new("/dev/null")).unwrap();
        let mut buf = [0u8; QUERY_HEADER_LEN];
        encode_query_header(100, &mut buf).unwrap();
        let err = channel.query_commands(&mut buf).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}
