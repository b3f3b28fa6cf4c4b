// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Library context: configuration, transport and the enumerated memdevs.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::memdev::{Memdev, MemdevAttributes};
use crate::sysfs;
use crate::transport::Transport;
use crate::Result;

/// Owns every memdev found at construction.
pub struct Context {
    config: Config,
    memdevs: Vec<Arc<Memdev>>,
}

impl Context {
    /// Enumerates memdevs under `config.sysfs_root` and binds them to `transport`.
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let attrs = sysfs::scan(&config.sysfs_root, &config.dev_root)?;
        Ok(Self::from_attributes(config, transport, attrs))
    }

    /// Builds a context from already known attributes. Duplicate ids keep the first seen.
    pub fn from_attributes(
        config: Config,
        transport: Arc<dyn Transport>,
        attrs: impl IntoIterator<Item = MemdevAttributes>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut memdevs = Vec::new();
        for attr in attrs {
            if !seen.insert(attr.id) {
                log::debug!("mem{}: duplicate id, keeping first", attr.id);
                continue;
            }
            memdevs.push(Arc::new(Memdev::new(attr, Arc::clone(&transport))));
        }
        memdevs.sort_by_key(|memdev| memdev.id());
        log::debug!("context: {} memdevs", memdevs.len());
        Self { config, memdevs }
    }

    /// Context over the host's kernel driver, configured from the environment.
    #[cfg(target_os = "linux")]
    pub fn open() -> Result<Self> {
        let config = Config::from_env()?;
        Self::new(config, Arc::new(crate::transport::DevTransport))
    }

    /// Configuration in effect.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Memdevs ordered by id.
    pub fn memdevs(&self) -> &[Arc<Memdev>] {
        &self.memdevs
    }

    /// Memdev with numeric id `id`.
    pub fn memdev_by_id(&self, id: u32) -> Option<Arc<Memdev>> {
        self.memdevs.iter().find(|memdev| memdev.id() == id).cloned()
    }

    /// Memdev named `name` (`memN`).
    pub fn memdev_by_name(&self, name: &str) -> Option<Arc<Memdev>> {
        self.memdevs.iter().find(|memdev| memdev.name() == name).cloned()
    }
}
