// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! CLI entry point (spec §6): `gossipmap-pinger <config> <master|slave>`,
//! grounded in `original_source/ping.py`'s `main`/`init_conf`.

mod cron;
mod guard;
mod logging;
mod worker;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use gossipmap_store::{CoordinationStore, RedisStore};
use gossipmap_types::config::{PingerConfig, Role};
use tracing::{error, info};

/// `gossipmap-pinger <config> <master|slave>` (spec §6).
#[derive(Parser, Debug)]
#[command(name = "gossipmap-pinger")]
struct Opts {
    /// Path to the `[ping]` TOML config file.
    config: PathBuf,
    /// Whether this process drives snapshot discovery or only pings.
    role: Role,
}

/// Mirrors `utils.new_redis_conn`: always `localhost:6379`, password read
/// from `REDIS_PASSWORD` if set.
fn redis_url() -> String {
    match std::env::var("REDIS_PASSWORD") {
        Ok(password) if !password.is_empty() => format!("redis://:{password}@localhost:6379"),
        _ => "redis://localhost:6379".to_string(),
    }
}

/// Clears all per-cycle coordination state, the way `main`'s master branch
/// does before the first snapshot poll (spec §6): an unclean shutdown
/// otherwise leaves `ping:cidr:*` counters and `open`/`opendata` membership
/// stale, permanently rejecting new peers in those prefixes and skipping
/// nodes the previous process still held open.
async fn reset_master_state(store: &dyn CoordinationStore) -> Result<(), gossipmap_store::StoreError> {
    store.delete("reachable").await?;
    store.delete("open").await?;
    store.delete("opendata").await?;
    for key in store.scan_keys("ping:cidr:*").await? {
        store.delete(&key).await?;
    }
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let conf = PingerConfig::load(&opts.config)?;
    let _logging_guard = logging::init(&conf.logfile, conf.log_to_console, conf.debug);
    info!(logfile = %conf.logfile, "log started, press CTRL+C to terminate");

    let magic_number = conf.magic_number()?;
    let store: Arc<dyn CoordinationStore> = Arc::new(RedisStore::connect(&redis_url(), conf.db).await?);

    if opts.role.is_master() {
        reset_master_state(store.as_ref()).await?;
    }

    let conf = Arc::new(conf);

    info!(workers = conf.workers, role = %opts.role, "starting");

    if let Err(err) = cron::run(store, conf, opts.role, magic_number).await {
        error!(%err, "pinger cron exited");
    }

    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    if !opts.config.exists() {
        eprintln!("Usage: gossipmap-pinger <config> <master|slave>");
        return ExitCode::from(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(opts)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}
