// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Admin tool for CXL memory devices
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable (output format is for humans)
//! TEST_COVERAGE: Unit tests below + `tests/cli.rs` against the emulated devices
//!
//! PUBLIC API:
//!   - Cli / Action: clap argument model
//!   - run(): config -> context -> execute
//!   - execute(): one action against a context, output to any writer
//!
//! ADR: docs/adr/0001-cxl-mailbox-engine.md

#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cxl_mailbox::{sim, CommandFlags, CommandInfo, Config, ConfigError, Context, Memdev};
use thiserror::Error;

/// Command line.
#[derive(Debug, Parser)]
#[command(name = "cxl-mbox", version, about = "Inspect CXL memory devices through the mailbox")]
pub struct Cli {
    /// Use two emulated devices instead of the kernel driver.
    #[arg(long)]
    pub sim: bool,
    /// Configuration file; defaults to $CXL_MAILBOX_CONFIG, then /etc/cxl/mailbox.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Action to run.
    #[command(subcommand)]
    pub action: Action,
}

/// Tool actions.
#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Action {
    /// List memory devices.
    List,
    /// Show the command catalog of a device.
    Commands {
        /// Device, as `memN` or `N`.
        memdev: String,
    },
    /// Decode Identify Memory Device.
    Identify {
        /// Device, as `memN` or `N`.
        memdev: String,
    },
    /// Decode Get Health Info.
    Health {
        /// Device, as `memN` or `N`.
        memdev: String,
    },
    /// Hex dump the label storage area.
    ReadLabels {
        /// Device, as `memN` or `N`.
        memdev: String,
        /// Start offset in bytes.
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Bytes to read; defaults to the rest of the area.
        #[arg(long)]
        len: Option<usize>,
    },
}

/// Tool errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Engine failure, including decoded mailbox status.
    #[error(transparent)]
    Mailbox(#[from] cxl_mailbox::Error),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Output could not be written.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    /// No device matched the argument.
    #[error("no such memdev: {0}")]
    UnknownMemdev(String),
    /// The kernel transport does not exist on this platform.
    #[error("the kernel transport is only available on Linux; use --sim")]
    NoTransport,
}

/// Configuration from `--config`, or from the environment.
pub fn load_config(cli: &Cli) -> Result<Config, ToolError> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

/// Context over the emulated devices or the kernel driver.
pub fn build_context(cli: &Cli, config: Config) -> Result<Context, ToolError> {
    if cli.sim {
        return Ok(sim::demo_context(config));
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Context::new(config, Arc::new(cxl_mailbox::DevTransport))?)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = config;
        Err(ToolError::NoTransport)
    }
}

fn find_memdev(ctx: &Context, arg: &str) -> Result<Arc<Memdev>, ToolError> {
    let by_id = || arg.parse().ok().and_then(|id| ctx.memdev_by_id(id));
    ctx.memdev_by_name(arg)
        .or_else(by_id)
        .ok_or_else(|| ToolError::UnknownMemdev(arg.to_string()))
}

fn size_label(size: i32) -> String {
    if size < 0 {
        "var".to_string()
    } else {
        size.to_string()
    }
}

fn flags_label(info: &CommandInfo) -> String {
    let mut parts = Vec::new();
    if info.flags.contains(CommandFlags::ENABLED) {
        parts.push("enabled");
    }
    if info.flags.contains(CommandFlags::EXCLUSIVE) {
        parts.push("exclusive");
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(",")
    }
}

fn hexdump(out: &mut dyn Write, base: usize, data: &[u8]) -> io::Result<()> {
    for (i, row) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = row.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(out, "{:08x}: {}", base + i * 16, bytes.join(" "))?;
    }
    Ok(())
}

/// Runs `action` against `ctx`, writing human readable output to `out`.
pub fn execute(action: &Action, ctx: &Context, out: &mut dyn Write) -> Result<(), ToolError> {
    match action {
        Action::List => {
            for memdev in ctx.memdevs() {
                write!(
                    out,
                    "{} dev={} payload_max={} lsa_size={} fw={:?} ram={:#x} pmem={:#x}",
                    memdev.name(),
                    memdev.devnum(),
                    memdev.payload_max(),
                    memdev.lsa_size(),
                    memdev.firmware_version(),
                    memdev.ram_size(),
                    memdev.pmem_size(),
                )?;
                if let Some(serial) = memdev.serial() {
                    write!(out, " serial={serial:#x}")?;
                }
                if let Some(node) = memdev.numa_node() {
                    write!(out, " numa_node={node}")?;
                }
                writeln!(out)?;
            }
        }
        Action::Commands { memdev } => {
            let memdev = find_memdev(ctx, memdev)?;
            for info in memdev.catalog()?.iter() {
                writeln!(
                    out,
                    "{:>3} {:<32} in={:<5} out={:<5} {}",
                    info.id,
                    info.name(),
                    size_label(info.size_in),
                    size_label(info.size_out),
                    flags_label(info)
                )?;
            }
        }
        Action::Identify { memdev } => {
            let identify = find_memdev(ctx, memdev)?.identify()?;
            writeln!(out, "fw_revision: {}", identify.fw_revision)?;
            writeln!(out, "total_capacity: {:#x}", identify.total_capacity)?;
            writeln!(out, "volatile_only_capacity: {:#x}", identify.volatile_only_capacity)?;
            writeln!(out, "persistent_only_capacity: {:#x}", identify.persistent_only_capacity)?;
            writeln!(out, "partition_align: {:#x}", identify.partition_align)?;
            let [info, warn, fail, fatal] = identify.event_log_sizes;
            writeln!(out, "event_log_sizes: info={info} warn={warn} fail={fail} fatal={fatal}")?;
            writeln!(out, "lsa_size: {}", identify.lsa_size)?;
            writeln!(out, "poison_list_max_records: {}", identify.poison_list_max_records)?;
            writeln!(out, "inject_poison_limit: {}", identify.inject_poison_limit)?;
            writeln!(out, "poison_caps: {:#04x}", identify.poison_caps)?;
            writeln!(out, "qos_telemetry_caps: {:#04x}", identify.qos_telemetry_caps)?;
        }
        Action::Health { memdev } => {
            let health = find_memdev(ctx, memdev)?.health_info()?;
            writeln!(out, "health_status: {:?}", health.health_status)?;
            writeln!(out, "media_status: {}", health.media_status)?;
            writeln!(out, "ext_status: {:#04x}", health.ext_status)?;
            writeln!(out, "life_used: {}%", health.life_used)?;
            writeln!(out, "temperature: {}C", health.temperature)?;
            writeln!(out, "dirty_shutdowns: {}", health.dirty_shutdowns)?;
            writeln!(out, "volatile_errors: {}", health.volatile_errors)?;
            writeln!(out, "pmem_errors: {}", health.pmem_errors)?;
        }
        Action::ReadLabels { memdev, offset, len } => {
            let memdev = find_memdev(ctx, memdev)?;
            let len = len.unwrap_or_else(|| memdev.lsa_size().saturating_sub(*offset));
            let mut buf = vec![0u8; len];
            memdev.read_label(&mut buf, *offset)?;
            hexdump(out, *offset, &buf)?;
        }
    }
    Ok(())
}

/// Loads configuration, starts logging, builds the context and runs the action on stdout.
pub fn run(cli: &Cli) -> Result<(), ToolError> {
    let config = load_config(cli)?;
    let level = config.level_filter()?;
    // RUST_LOG, when set, takes precedence over the configured level.
    let _ = env_logger::Builder::new().filter_level(level).parse_default_env().try_init();
    log::debug!("cxl-mbox: {:?} (sim={})", cli.action, cli.sim);
    let ctx = build_context(cli, config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli.action, &ctx, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_read_labels() {
        let cli = Cli::try_parse_from(["cxl-mbox", "--sim", "read-labels", "mem0", "--len", "64"]).unwrap();
        assert!(cli.sim);
        assert_eq!(
            cli.action,
            Action::ReadLabels { memdev: "mem0".to_string(), offset: 0, len: Some(64) }
        );
    }

    #[test]
    fn size_and_flag_labels() {
        assert_eq!(size_label(-1), "var");
        assert_eq!(size_label(67), "67");
        let info = CommandInfo::new(1, CommandFlags::ENABLED | CommandFlags::EXCLUSIVE, 0, 67);
        assert_eq!(flags_label(&info), "enabled,exclusive");
    }
}
