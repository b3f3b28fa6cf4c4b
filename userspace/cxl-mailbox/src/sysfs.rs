// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Memdev discovery over a sysfs-like registry.
//!
//! Layout per device: `<root>/memN/{dev, payload_max, label_storage_size, firmware_version,
//! pmem/size, ram/size}` plus optional `serial` and `numa_node`. Numbers are decimal or
//! `0x`-prefixed hex.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::memdev::MemdevAttributes;
use crate::transport::DevNum;
use crate::{Error, Result};

/// Parses the id out of a `memN` entry name.
pub fn memdev_id(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("mem")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parses a decimal or `0x` hex number.
pub fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn read_attr(dir: &Path, attr: &str) -> Result<String> {
    let path = dir.join(attr);
    fs::read_to_string(&path)
        .map(|text| text.trim_end().to_string())
        .map_err(|source| Error::Sysfs { path, source })
}

fn read_optional_attr(dir: &Path, attr: &str) -> Result<Option<String>> {
    match read_attr(dir, attr) {
        Ok(text) => Ok(Some(text)),
        Err(Error::Sysfs { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn number_attr(dir: &Path, attr: &str) -> Result<u64> {
    let text = read_attr(dir, attr)?;
    parse_number(&text).ok_or_else(|| Error::Attribute {
        path: dir.join(attr),
        reason: format!("expected a number, got {text:?}"),
    })
}

fn usize_attr(dir: &Path, attr: &str) -> Result<usize> {
    let value = number_attr(dir, attr)?;
    usize::try_from(value).map_err(|_| Error::Attribute {
        path: dir.join(attr),
        reason: format!("{value} does not fit in usize"),
    })
}

/// Reads the attributes of one device directory.
pub fn read_memdev(dir: &Path, dev_root: &Path) -> Result<MemdevAttributes> {
    let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let id = memdev_id(name).ok_or_else(|| Error::Attribute {
        path: dir.to_path_buf(),
        reason: "entry is not named memN".to_string(),
    })?;

    let dev = read_attr(dir, "dev")?;
    let devnum: DevNum = dev.parse().map_err(|err| Error::Attribute {
        path: dir.join("dev"),
        reason: format!("{err}"),
    })?;

    let serial = read_optional_attr(dir, "serial")?.and_then(|text| {
        let serial = parse_number(&text);
        if serial.is_none() {
            log::warn!("{}: ignoring malformed serial {text:?}", dir.display());
        }
        serial
    });
    let numa_node = read_optional_attr(dir, "numa_node")?.and_then(|text| match text.trim() {
        // The kernel reports -1 for "no node".
        "-1" => None,
        node => {
            let node = node.parse().ok();
            if node.is_none() {
                log::warn!("{}: ignoring malformed numa_node {text:?}", dir.display());
            }
            node
        }
    });

    Ok(MemdevAttributes {
        id,
        devnode: dev_root.join(name),
        devnum,
        payload_max: usize_attr(dir, "payload_max")?,
        lsa_size: usize_attr(dir, "label_storage_size")?,
        firmware_version: read_attr(dir, "firmware_version")?,
        pmem_size: number_attr(dir, "pmem/size")?,
        ram_size: number_attr(dir, "ram/size")?,
        serial,
        numa_node,
    })
}

/// Scans `root` for `memN` entries.
///
/// Other entries are ignored; devices with missing or malformed attributes are skipped with a
/// warning. A missing root yields no devices.
pub fn scan(root: &Path, dev_root: &Path) -> Result<Vec<MemdevAttributes>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::debug!("{}: no registry, no memdevs", root.display());
            return Ok(Vec::new());
        }
        Err(source) => return Err(Error::Sysfs { path: root.to_path_buf(), source }),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Sysfs { path: root.to_path_buf(), source })?;
        let path: PathBuf = entry.path();
        let is_memdev = entry.file_name().to_str().and_then(memdev_id).is_some();
        if !is_memdev {
            continue;
        }
        match read_memdev(&path, dev_root) {
            Ok(attrs) => found.push(attrs),
            Err(err) => log::warn!("skipping {}: {err}", path.display()),
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memdev_names() {
        assert_eq!(memdev_id("mem0"), Some(0));
        assert_eq!(memdev_id("mem12"), Some(12));
        assert_eq!(memdev_id("mem"), None);
        assert_eq!(memdev_id("memx"), None);
        assert_eq!(memdev_id("decoder0.0"), None);
        assert_eq!(memdev_id("mem+1"), None);
    }

    #[test]
    fn numbers_in_both_radixes() {
        assert_eq!(parse_number("0x10000000\n"), Some(0x1000_0000));
        assert_eq!(parse_number("4096"), Some(4096));
        assert_eq!(parse_number("0xzz"), None);
        assert_eq!(parse_number(""), None);
    }
}
