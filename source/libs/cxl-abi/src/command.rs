// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kernel command identifiers, their names, and the mailbox opcodes they map to.

use bitflags::bitflags;

bitflags! {
    /// Effect bits reported per command by the query ioctl.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u32 {
        /// The driver currently allows the command.
        const ENABLED = 1 << 0;
        /// The command is reserved for exclusive kernel use.
        const EXCLUSIVE = 1 << 1;
    }
}

macro_rules! command_table {
    ($( $variant:ident = $id:literal, $name:literal, $opcode:expr; )*) => {
        /// Command identifiers understood by `CXL_MEM_SEND_COMMAND`.
        ///
        /// These are kernel ids, not mailbox opcodes. [`CommandId::Raw`] carries an arbitrary
        /// opcode alongside it.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum CommandId {
            $( #[doc = $name] $variant = $id, )*
        }

        impl CommandId {
            /// Every known id, in kernel order.
            pub const ALL: &'static [CommandId] = &[$(CommandId::$variant,)*];

            /// Looks up a kernel id.
            pub const fn from_raw(id: u32) -> Option<Self> {
                match id {
                    $( $id => Some(CommandId::$variant), )*
                    _ => None,
                }
            }

            /// Human readable command name.
            pub const fn name(self) -> &'static str {
                match self {
                    $( CommandId::$variant => $name, )*
                }
            }

            /// Mailbox opcode the kernel issues for this id, if it is fixed.
            pub const fn opcode(self) -> Option<u16> {
                match self {
                    $( CommandId::$variant => $opcode, )*
                }
            }
        }
    };
}

command_table! {
    Invalid = 0, "Invalid Command", None;
    Identify = 1, "Identify Command", Some(opcode::IDENTIFY);
    Raw = 2, "Raw device command", None;
    GetSupportedLogs = 3, "Get Supported Logs", Some(opcode::GET_SUPPORTED_LOGS);
    GetFwInfo = 4, "Get FW Info", Some(opcode::GET_FW_INFO);
    GetPartitionInfo = 5, "Get Partition Information", Some(opcode::GET_PARTITION_INFO);
    GetLsa = 6, "Get Label Storage Area", Some(opcode::GET_LSA);
    GetHealthInfo = 7, "Get Health Info", Some(opcode::GET_HEALTH_INFO);
    GetLog = 8, "Get Log", Some(opcode::GET_LOG);
    SetPartitionInfo = 9, "Set Partition Information", Some(opcode::SET_PARTITION_INFO);
    SetLsa = 10, "Set Label Storage Area", Some(opcode::SET_LSA);
    GetAlertConfig = 11, "Get Alert Configuration", Some(opcode::GET_ALERT_CONFIG);
    SetAlertConfig = 12, "Set Alert Configuration", Some(opcode::SET_ALERT_CONFIG);
    GetShutdownState = 13, "Get Shutdown State", Some(opcode::GET_SHUTDOWN_STATE);
    SetShutdownState = 14, "Set Shutdown State", Some(opcode::SET_SHUTDOWN_STATE);
    GetPoison = 15, "Get Poison List", Some(opcode::GET_POISON);
    InjectPoison = 16, "Inject Poison", Some(opcode::INJECT_POISON);
    ClearPoison = 17, "Clear Poison", Some(opcode::CLEAR_POISON);
    GetScanMediaCaps = 18, "Get Scan Media Capabilities", Some(opcode::GET_SCAN_MEDIA_CAPS);
    ScanMedia = 19, "Scan Media", Some(opcode::SCAN_MEDIA);
    GetScanMedia = 20, "Get Scan Media Results", Some(opcode::GET_SCAN_MEDIA);
    GetTimestamp = 21, "Get Timestamp", Some(opcode::GET_TIMESTAMP);
    GetLogCaps = 22, "Get Log Capabilities", Some(opcode::GET_LOG_CAPS);
    ClearLog = 23, "Clear Log", Some(opcode::CLEAR_LOG);
    GetSupLogSubList = 24, "Get Supported Logs Sub-List", Some(opcode::GET_SUP_LOG_SUBLIST);
}

impl From<CommandId> for u32 {
    fn from(id: CommandId) -> Self {
        id as u32
    }
}

/// Mailbox opcodes (CXL 2.0 / 3.x command sets).
#[allow(missing_docs)]
pub mod opcode {
    pub const GET_FW_INFO: u16 = 0x0200;
    pub const GET_TIMESTAMP: u16 = 0x0300;
    pub const GET_SUPPORTED_LOGS: u16 = 0x0400;
    pub const GET_LOG: u16 = 0x0401;
    pub const GET_LOG_CAPS: u16 = 0x0402;
    pub const CLEAR_LOG: u16 = 0x0403;
    pub const GET_SUP_LOG_SUBLIST: u16 = 0x0405;
    pub const IDENTIFY: u16 = 0x4000;
    pub const GET_PARTITION_INFO: u16 = 0x4100;
    pub const SET_PARTITION_INFO: u16 = 0x4101;
    pub const GET_LSA: u16 = 0x4102;
    pub const SET_LSA: u16 = 0x4103;
    pub const GET_HEALTH_INFO: u16 = 0x4200;
    pub const GET_ALERT_CONFIG: u16 = 0x4201;
    pub const SET_ALERT_CONFIG: u16 = 0x4202;
    pub const GET_SHUTDOWN_STATE: u16 = 0x4203;
    pub const SET_SHUTDOWN_STATE: u16 = 0x4204;
    pub const GET_POISON: u16 = 0x4300;
    pub const INJECT_POISON: u16 = 0x4301;
    pub const CLEAR_POISON: u16 = 0x4302;
    pub const GET_SCAN_MEDIA_CAPS: u16 = 0x4303;
    pub const SCAN_MEDIA: u16 = 0x4304;
    pub const GET_SCAN_MEDIA: u16 = 0x4305;
}
