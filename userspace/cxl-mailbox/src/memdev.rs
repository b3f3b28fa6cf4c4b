// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memory device handle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cxl_abi::CommandInfo;
use once_cell::sync::OnceCell;

use crate::catalog::Catalog;
use crate::transport::{DevNum, Transport};
use crate::Result;

/// Attributes read once at discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemdevAttributes {
    /// Numeric id from the `memN` name.
    pub id: u32,
    /// Device node path.
    pub devnode: PathBuf,
    /// Device number recorded in the registry.
    pub devnum: DevNum,
    /// Largest mailbox payload in either direction.
    pub payload_max: usize,
    /// Label storage area size.
    pub lsa_size: usize,
    /// Firmware version string.
    pub firmware_version: String,
    /// Persistent capacity in bytes.
    pub pmem_size: u64,
    /// Volatile capacity in bytes.
    pub ram_size: u64,
    /// Device serial number.
    pub serial: Option<u64>,
    /// NUMA node of the device.
    pub numa_node: Option<u32>,
}

/// One memory device. Shared through `Arc`; the catalog is fetched on first use and then fixed.
pub struct Memdev {
    attrs: MemdevAttributes,
    name: String,
    transport: Arc<dyn Transport>,
    catalog: OnceCell<Arc<Catalog>>,
}

impl Memdev {
    /// Binds discovered attributes to a transport.
    pub fn new(attrs: MemdevAttributes, transport: Arc<dyn Transport>) -> Self {
        let name = format!("mem{}", attrs.id);
        Self { attrs, name, transport, catalog: OnceCell::new() }
    }

    /// Numeric id.
    pub fn id(&self) -> u32 {
        self.attrs.id
    }

    /// `memN`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device node path.
    pub fn devnode(&self) -> &Path {
        &self.attrs.devnode
    }

    /// Device number recorded at discovery.
    pub fn devnum(&self) -> DevNum {
        self.attrs.devnum
    }

    /// Largest mailbox payload.
    pub fn payload_max(&self) -> usize {
        self.attrs.payload_max
    }

    /// Label storage area size.
    pub fn lsa_size(&self) -> usize {
        self.attrs.lsa_size
    }

    /// Firmware version string.
    pub fn firmware_version(&self) -> &str {
        &self.attrs.firmware_version
    }

    /// Persistent capacity in bytes.
    pub fn pmem_size(&self) -> u64 {
        self.attrs.pmem_size
    }

    /// Volatile capacity in bytes.
    pub fn ram_size(&self) -> u64 {
        self.attrs.ram_size
    }

    /// Serial number, if reported.
    pub fn serial(&self) -> Option<u64> {
        self.attrs.serial
    }

    /// NUMA node, if any.
    pub fn numa_node(&self) -> Option<u32> {
        self.attrs.numa_node
    }

    /// Discovery attributes.
    pub fn attributes(&self) -> &MemdevAttributes {
        &self.attrs
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Capability catalog, fetched on first call. A failed fetch is not cached.
    pub fn catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog
            .get_or_try_init(|| {
                log::debug!("{}: fetching command catalog", self.name);
                Catalog::fetch(self.transport(), self.devnode(), self.devnum()).map(Arc::new)
            })
            .cloned()
    }

    /// Catalog if it has already been fetched.
    pub fn cached_catalog(&self) -> Option<&Arc<Catalog>> {
        self.catalog.get()
    }

    /// Commands the device reports, in reported order.
    pub fn supported_commands(&self) -> Result<Vec<CommandInfo>> {
        Ok(self.catalog()?.iter().copied().collect())
    }
}

impl fmt::Debug for Memdev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memdev")
            .field("name", &self.name)
            .field("devnum", &self.attrs.devnum)
            .field("payload_max", &self.attrs.payload_max)
            .field("catalog_cached", &self.catalog.get().is_some())
            .finish()
    }
}
