// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine error type.

use std::io;
use std::path::PathBuf;

use cxl_abi::DecodeError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::status::MboxStatus;
use crate::transport::DevNum;

/// Errors surfaced by discovery, validation, submission and decode.
#[derive(Debug, Error)]
pub enum Error {
    /// A registry attribute could not be read.
    #[error("failed to read {path}: {source}")]
    Sysfs {
        /// Attribute or directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A registry attribute was present but malformed.
    #[error("invalid attribute {path}: {reason}")]
    Attribute {
        /// Attribute path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
    /// The device catalog has no entry for the command.
    #[error("command {id} ({}) is not supported by the device", id_name(.id))]
    Unsupported {
        /// Kernel command id.
        id: u32,
    },
    /// Submission attempted before the command was validated.
    #[error("command has not been validated against the device catalog")]
    NotValidated,
    /// Requested buffer larger than the device mailbox.
    #[error("payload size {requested} exceeds payload_max {max}")]
    InvalidPayloadSize {
        /// Requested length.
        requested: usize,
        /// Device `payload_max`.
        max: usize,
    },
    /// The devnode does not identify the enumerated device.
    #[error("{path}: expected character device {expected}, found {}", found_label(.found))]
    DeviceMismatch {
        /// Devnode path.
        path: PathBuf,
        /// Major/minor recorded at discovery.
        expected: DevNum,
        /// Major/minor of the opened node; `None` when it is not a character device.
        found: Option<DevNum>,
    },
    /// The OS call itself failed.
    #[error("{path}: transport failure: {source}")]
    Transport {
        /// Devnode path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Firmware completed the command with a non-success code.
    #[error("{command}: {status}")]
    Mailbox {
        /// Command description.
        command: String,
        /// Decoded completion code.
        status: MboxStatus,
    },
    /// A reply or buffer was shorter than the structure read from it.
    #[error("{what} truncated: need {need} bytes, have {have}")]
    Truncated {
        /// Structure being decoded.
        what: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },
    /// Label access outside the label storage area.
    #[error("label range {offset}+{len} exceeds label storage size {size}")]
    LabelRange {
        /// Start offset.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Device `lsa_size`.
        size: usize,
    },
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Maps a wire decode failure onto [`Error::Truncated`] for `what`.
    pub(crate) fn truncated(what: &'static str) -> impl Fn(DecodeError) -> Error {
        move |err| match err {
            DecodeError::Short { need, have } => Error::Truncated { what, need, have },
        }
    }

    /// Firmware completion code, if this is a mailbox failure.
    pub fn mbox_status(&self) -> Option<MboxStatus> {
        match self {
            Error::Mailbox { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::truncated("wire buffer")(err)
    }
}

fn id_name(id: &u32) -> &'static str {
    cxl_abi::CommandId::from_raw(*id).map(cxl_abi::CommandId::name).unwrap_or("Unknown Command")
}

fn found_label(found: &Option<DevNum>) -> String {
    match found {
        Some(devnum) => devnum.to_string(),
        None => "a non-character device".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_both_numbers() {
        let err = Error::DeviceMismatch {
            path: PathBuf::from("/dev/cxl/mem0"),
            expected: DevNum::new(10, 3),
            found: Some(DevNum::new(10, 4)),
        };
        let text = err.to_string();
        assert!(text.contains("10:3") && text.contains("10:4"), "{text}");
    }

    #[test]
    fn unsupported_message_names_command() {
        let text = Error::Unsupported { id: 7 }.to_string();
        assert!(text.contains("Get Health Info"), "{text}");
    }

    #[test]
    fn decode_errors_become_truncated() {
        let err: Error = DecodeError::Short { need: 8, have: 2 }.into();
        assert!(matches!(err, Error::Truncated { need: 8, have: 2, .. }));
    }
}
