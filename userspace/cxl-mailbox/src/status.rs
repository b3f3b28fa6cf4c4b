// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Firmware mailbox completion codes.
//!
//! Codes `0..=22` come from a fixed table; anything else decodes to [`MboxStatus::Unknown`]. The
//! engine never acts on a code, it only classifies it.

use core::fmt;

/// Decoded mailbox completion code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MboxStatus {
    /// Command completed.
    Success,
    /// Background command started.
    BackgroundStarted,
    /// Input payload was invalid.
    InvalidInput,
    /// Command not supported by the device.
    Unsupported,
    /// Internal device error.
    InternalError,
    /// Transient failure; the caller may retry once.
    RetryRequired,
    /// A background operation is in progress.
    Busy,
    /// Media access is disabled.
    MediaDisabled,
    /// Another firmware transfer is in progress.
    FwTransferInProgress,
    /// Firmware package transferred out of order.
    FwTransferOutOfOrder,
    /// Firmware package authentication failed.
    FwAuthenticationFailed,
    /// Firmware slot invalid for the operation.
    FwInvalidSlot,
    /// Firmware activation rolled back.
    FwRolledBack,
    /// Firmware activation needs a cold reset.
    FwResetRequired,
    /// One or more event record handles were invalid.
    InvalidHandle,
    /// Physical address invalid.
    InvalidPhysicalAddress,
    /// Poison injection limit reached.
    PoisonLimitReached,
    /// Permanent media failure.
    PermanentMediaFailure,
    /// Background command aborted.
    Aborted,
    /// Not valid in the current security state.
    InvalidSecurityState,
    /// Passphrase does not match.
    IncorrectPassphrase,
    /// Command unsupported on this mailbox.
    UnsupportedMailbox,
    /// Payload length invalid.
    InvalidPayloadLength,
    /// Code outside the table.
    Unknown(u32),
}

struct Entry {
    status: MboxStatus,
    description: &'static str,
    errno: i32,
}

const fn entry(status: MboxStatus, description: &'static str, errno: i32) -> Entry {
    Entry { status, description, errno }
}

static TABLE: [Entry; 23] = [
    entry(MboxStatus::Success, "success", 0),
    entry(MboxStatus::BackgroundStarted, "background cmd started successfully", libc::ENXIO),
    entry(MboxStatus::InvalidInput, "cmd input was invalid", libc::ENXIO),
    entry(MboxStatus::Unsupported, "cmd is not supported", libc::ENXIO),
    entry(MboxStatus::InternalError, "internal device error", libc::ENXIO),
    entry(MboxStatus::RetryRequired, "temporary error, retry once", libc::ENXIO),
    entry(MboxStatus::Busy, "ongoing background operation", libc::ENXIO),
    entry(MboxStatus::MediaDisabled, "media access is disabled", libc::ENXIO),
    entry(
        MboxStatus::FwTransferInProgress,
        "one FW package can be transferred at a time",
        libc::ENXIO,
    ),
    entry(
        MboxStatus::FwTransferOutOfOrder,
        "FW package content was transferred out of order",
        libc::ENXIO,
    ),
    entry(MboxStatus::FwAuthenticationFailed, "FW package authentication failed", libc::ENXIO),
    entry(
        MboxStatus::FwInvalidSlot,
        "FW slot is not supported for requested operation",
        libc::ENXIO,
    ),
    entry(MboxStatus::FwRolledBack, "rolled back to the previous active FW", libc::ENXIO),
    entry(MboxStatus::FwResetRequired, "FW failed to activate, needs cold reset", libc::ENXIO),
    entry(
        MboxStatus::InvalidHandle,
        "one or more Event Record Handles were invalid",
        libc::ENXIO,
    ),
    entry(MboxStatus::InvalidPhysicalAddress, "physical address specified is invalid", libc::EFAULT),
    entry(MboxStatus::PoisonLimitReached, "poison injection limit has been reached", libc::EBUSY),
    entry(MboxStatus::PermanentMediaFailure, "permanent issue with the media", libc::EIO),
    entry(MboxStatus::Aborted, "background cmd was aborted by device", libc::ENXIO),
    entry(
        MboxStatus::InvalidSecurityState,
        "not valid in the current security state",
        libc::ENXIO,
    ),
    entry(
        MboxStatus::IncorrectPassphrase,
        "phrase doesn't match current set passphrase",
        libc::ENXIO,
    ),
    entry(MboxStatus::UnsupportedMailbox, "unsupported on the mailbox it was issued on", libc::ENXIO),
    entry(MboxStatus::InvalidPayloadLength, "invalid payload length", libc::ENXIO),
];

impl MboxStatus {
    /// Decodes a raw completion code. Total: every `u32` maps to exactly one status.
    pub fn from_code(code: u32) -> Self {
        TABLE.get(code as usize).map(|e| e.status).unwrap_or(MboxStatus::Unknown(code))
    }

    /// Raw completion code.
    pub fn code(self) -> u32 {
        match self {
            MboxStatus::Unknown(code) => code,
            known => TABLE.iter().position(|e| e.status == known).unwrap_or(0) as u32,
        }
    }

    fn entry(self) -> Option<&'static Entry> {
        match self {
            MboxStatus::Unknown(_) => None,
            known => TABLE.iter().find(|e| e.status == known),
        }
    }

    /// Human readable description.
    pub fn description(self) -> &'static str {
        self.entry().map(|e| e.description).unwrap_or("unknown mailbox status")
    }

    /// Errno a caller can surface for this code (`0` on success).
    pub fn errno(self) -> i32 {
        self.entry().map(|e| e.errno).unwrap_or(libc::ENXIO)
    }

    /// `true` for [`MboxStatus::Success`].
    pub fn is_success(self) -> bool {
        self == MboxStatus::Success
    }

    /// `true` when the device asked for the command to be reissued.
    pub fn is_retryable(self) -> bool {
        self == MboxStatus::RetryRequired
    }

    /// `true` for the firmware update family of failures.
    pub fn is_firmware_update(self) -> bool {
        matches!(
            self,
            MboxStatus::FwTransferInProgress
                | MboxStatus::FwTransferOutOfOrder
                | MboxStatus::FwAuthenticationFailed
                | MboxStatus::FwInvalidSlot
                | MboxStatus::FwRolledBack
                | MboxStatus::FwResetRequired
        )
    }

    /// Every table entry in code order.
    pub fn known() -> impl Iterator<Item = MboxStatus> {
        TABLE.iter().map(|e| e.status)
    }
}

impl From<u32> for MboxStatus {
    fn from(code: u32) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for MboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mailbox status {:#x})", self.description(), self.code())
    }
}
