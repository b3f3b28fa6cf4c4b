// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Binary entrypoint.

use std::process::ExitCode;

use clap::Parser;
use cxl_mbox::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cxl_mbox::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cxl-mbox: {err}");
            ExitCode::FAILURE
        }
    }
}
