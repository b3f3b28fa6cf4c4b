// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Device capability catalog and the per-command validation state.

use std::io;
use std::path::Path;

use cxl_abi::query::{
    decode_query_count, encode_query_header, query_buffer_len, MAX_QUERY_COMMANDS, QUERY_HEADER_LEN,
};
use cxl_abi::{CommandFlags, CommandInfo, CommandInfoIter};

use crate::transport::{open_checked, DevNum, Transport};
use crate::{Error, Result};

/// Commands the device reports through the query ioctl, in reported order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CommandInfo>,
}

impl Catalog {
    /// Catalog over already known descriptors.
    pub fn from_entries(entries: Vec<CommandInfo>) -> Self {
        Self { entries }
    }

    /// Two-phase query: count first, then descriptors. Each phase opens and checks the devnode.
    pub(crate) fn fetch(transport: &dyn Transport, devnode: &Path, devnum: DevNum) -> Result<Self> {
        let transport_err = |source| Error::Transport { path: devnode.to_path_buf(), source };

        let requested = {
            let mut header = [0u8; QUERY_HEADER_LEN];
            encode_query_header(0, &mut header)?;
            let mut channel = open_checked(transport, devnode, devnum)?;
            channel.query_commands(&mut header).map_err(transport_err)?;
            decode_query_count(&header)?
        };

        let len = query_buffer_len(requested)
            .filter(|_| requested <= MAX_QUERY_COMMANDS)
            .ok_or_else(|| {
                log::error!("{}: device reported {requested} commands", devnode.display());
                transport_err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("device reported {requested} commands, limit is {MAX_QUERY_COMMANDS}"),
                ))
            })?;
        let mut buf = vec![0u8; len];
        encode_query_header(requested, &mut buf)?;
        {
            let mut channel = open_checked(transport, devnode, devnum)?;
            channel.query_commands(&mut buf).map_err(transport_err)?;
        }
        let reported = decode_query_count(&buf)?;
        if reported != requested {
            log::warn!(
                "{}: query reported {reported} commands after sizing for {requested}",
                devnode.display()
            );
        }
        let entries: Vec<CommandInfo> =
            CommandInfoIter::new(&buf, reported.min(requested))?.collect();
        log::debug!("{}: catalog holds {} commands", devnode.display(), entries.len());
        Ok(Self { entries })
    }

    /// First entry for `id` and its position. Later duplicates are never consulted.
    pub fn find(&self, id: impl Into<u32>) -> Option<(usize, &CommandInfo)> {
        let id = id.into();
        self.entries.iter().enumerate().find(|(_, info)| info.id == id)
    }

    /// First entry for `id`.
    pub fn get(&self, id: impl Into<u32>) -> Option<&CommandInfo> {
        self.find(id).map(|(_, info)| info)
    }

    /// `true` when the device reports `id`.
    pub fn is_supported(&self, id: impl Into<u32>) -> bool {
        self.find(id).is_some()
    }

    /// Entries in reported order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandInfo> {
        self.entries.iter()
    }

    /// Entries the driver currently has enabled.
    pub fn enabled(&self) -> impl Iterator<Item = &CommandInfo> {
        self.entries.iter().filter(|info| info.flags.contains(CommandFlags::ENABLED))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the device reported no commands.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of validating one command against a catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryStatus {
    /// Not validated yet.
    #[default]
    NotRun,
    /// The catalog has an entry for the command.
    Supported {
        /// Position of the matched entry.
        index: usize,
        /// The matched entry.
        info: CommandInfo,
    },
    /// The catalog has no entry for the command.
    Unsupported,
}

impl QueryStatus {
    /// Validates `id` against `catalog`. A `Supported` state is final.
    pub fn transition(self, catalog: &Catalog, id: u32) -> Self {
        if let QueryStatus::Supported { .. } = self {
            return self;
        }
        match catalog.find(id) {
            Some((index, info)) => QueryStatus::Supported { index, info: *info },
            None => QueryStatus::Unsupported,
        }
    }

    /// Matched entry, when supported.
    pub fn info(&self) -> Option<&CommandInfo> {
        match self {
            QueryStatus::Supported { info, .. } => Some(info),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, size_in: i32, size_out: i32) -> CommandInfo {
        CommandInfo::new(id, CommandFlags::ENABLED, size_in, size_out)
    }

    #[test]
    fn first_match_wins() {
        let catalog = Catalog::from_entries(vec![info(5, 4, 8), info(7, 0, 18), info(5, 0, 0)]);
        let (index, found) = catalog.find(5u32).unwrap();
        assert_eq!(index, 0);
        assert_eq!(found.size_in, 4);
        assert!(!catalog.is_supported(9u32));
    }

    #[test]
    fn transition_is_sticky_once_supported() {
        let catalog = Catalog::from_entries(vec![info(5, 4, 8)]);
        let status = QueryStatus::NotRun.transition(&catalog, 5);
        assert!(matches!(status, QueryStatus::Supported { index: 0, .. }));
        let empty = Catalog::default();
        assert_eq!(status.transition(&empty, 5), status);
        assert_eq!(QueryStatus::NotRun.transition(&empty, 5), QueryStatus::Unsupported);
    }

    #[test]
    fn enabled_filters_flags() {
        let mut disabled = info(8, 0, 0);
        disabled.flags = CommandFlags::empty();
        let catalog = Catalog::from_entries(vec![info(1, 0, 67), disabled]);
        assert_eq!(catalog.enabled().count(), 1);
        assert_eq!(catalog.len(), 2);
    }
}
