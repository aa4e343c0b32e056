/*
 * This file is part of digsd, the control-plane daemon for a wide-area
 * replicated data grid.
 *
 * Copyright (c) 2026, DiGS control plane contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # digsd
//!
//! The control-plane node for a wide-area replicated data grid. A single binary that,
//! depending on the command line, either runs the daemon (listener + background sweep)
//! or performs one-off maintenance against an existing working directory.

mod arbiter;
mod auth;
mod catalogue;
mod commands;
mod config;
mod dbnet;
mod drivers;
mod flock;
mod nodes;
mod notify;
mod pending;
mod registry;
mod replication;
mod state;
mod sweep;
mod util;
mod verify;

use clap::Parser;
use config::Command;
use drivers::local::fallback_local;
use libdigs::{URL, VERSION};
use notify::LogNotifier;
use state::ControlState;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const PID_FILE: &str = ".digsd_pid";
const EXIT_STARTUP_FAILURE: i32 = 1;

fn init_logger() {
    let level = env::var("QCDGRID_LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .unwrap_or(3)
        .clamp(1, 5);
    let filter = match level {
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    };
    env_logger::Builder::new().parse_filters(filter).init();
}

fn acquire_pid_file(working_dir: &std::path::Path) -> flock::FileLock {
    let path = working_dir.join(PID_FILE);
    match flock::FileLock::new(&path) {
        Ok(lock) => lock,
        Err(e) => {
            log::error!(
                "Startup failure: another digsd is already running against {}: {}",
                working_dir.display(),
                e
            );
            process::exit(EXIT_STARTUP_FAILURE);
        }
    }
}

fn main() {
    init_logger();
    log::info!("digsd v{VERSION} | {URL}");

    let cli = config::CliArgs::parse();
    let command = cli.command.clone();
    let working_dir_hint = cli
        .working_dir
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let (cfg, warnings) = match config::get_config(cli, working_dir_hint) {
        Ok(v) => v,
        Err(e) => {
            log::error!("Startup failure: {e}");
            process::exit(EXIT_STARTUP_FAILURE);
        }
    };
    warnings.print_warnings();

    if !cfg.working_dir.exists() {
        if let Err(e) = std::fs::create_dir_all(&cfg.working_dir) {
            log::error!(
                "Startup failure: failed to create working directory {}: {}",
                cfg.working_dir.display(),
                e
            );
            process::exit(EXIT_STARTUP_FAILURE);
        }
    }

    let pid_lock = acquire_pid_file(&cfg.working_dir);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("digsd-worker")
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            log::error!("Startup failure: failed to start the async runtime: {e}");
            process::exit(EXIT_STARTUP_FAILURE);
        });

    let mut state = match ControlState::load(cfg.working_dir.clone(), Arc::new(LogNotifier)) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Startup failure: failed to load node state: {e}");
            process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    // one driver instance per node, keyed by node name: a driver instance is bound to
    // a single SE's root and inbox, so nodes sharing a `driverKind` still need separate
    // instances. `driver_kind` would select the implementation to construct here once
    // more than one is available; only `LocalDriver` exists today
    let node_drivers: Vec<(String, String, Option<String>)> = state
        .nodes
        .lock()
        .iter()
        .map(|(_, node)| (node.name.clone(), node.path.clone(), node.inbox.clone()))
        .collect();
    for (name, path, inbox) in node_drivers {
        state.drivers.register(name, fallback_local(path, inbox.map(PathBuf::from)));
    }

    let exit_code = match command {
        Some(Command::Verify { host, forced_default }) => {
            runtime.block_on(run_verify(&state, &host, forced_default))
        }
        None => runtime.block_on(run_daemon(state, cfg)),
    };

    drop(pid_lock);
    process::exit(exit_code);
}

async fn run_daemon(state: ControlState, cfg: config::GridConfig) -> i32 {
    let state = Arc::new(state);
    match arbiter::run(state, cfg).await {
        Ok(()) => {
            log::info!("digsd shut down cleanly");
            0
        }
        Err(e) => {
            log::error!("Startup failure: {e}");
            EXIT_STARTUP_FAILURE
        }
    }
}

async fn run_verify(state: &ControlState, host: &str, forced_default: bool) -> i32 {
    let report = if forced_default {
        verify::verify_node(state, host, &verify::ForcedDefaultPrompt).await
    } else {
        verify::verify_node(state, host, &verify::TerminalPrompt).await
    };
    match report {
        Ok(report) => {
            println!("{report:#?}");
            if let Err(e) = state.save() {
                log::error!("failed to persist catalogue after verification: {e}");
                return EXIT_STARTUP_FAILURE;
            }
            0
        }
        Err(e) => {
            log::error!("verification failed: {e}");
            EXIT_STARTUP_FAILURE
        }
    }
}
