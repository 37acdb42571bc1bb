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

//! CLI entry point (spec §6): `gossipmap-crawler <config> <master|slave>`,
//! grounded in `original_source/crawl.py`'s `main`/`init_conf`.

mod bootstrap;
mod constants;
mod cron;
mod harvest;
mod logging;
mod worker;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use gossipmap_filter::{Filter, HttpPolicyFeed, MaxMindAsnResolver, NoAsnResolver, PolicyConfig};
use gossipmap_store::{CoordinationStore, RedisStore};
use gossipmap_types::config::{CrawlerConfig, Role};
use tracing::{error, info};

/// `gossipmap-crawler <config> <master|slave>` (spec §6).
#[derive(Parser, Debug)]
#[command(name = "gossipmap-crawler")]
struct Opts {
    /// Path to the `[crawl]` TOML config file.
    config: PathBuf,
    /// Whether this process drives the cron/restart cycle or only crawls.
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

fn build_filter(conf: &CrawlerConfig) -> Result<Arc<Filter>, anyhow::Error> {
    let mut default_v4 = Vec::new();
    let mut default_v6 = Vec::new();
    gossipmap_filter::parse_network_list(&conf.exclude_ipv4_networks, &mut default_v4, &mut default_v6);
    gossipmap_filter::parse_network_list(&conf.exclude_ipv6_networks, &mut default_v4, &mut default_v6);

    let policy = PolicyConfig {
        exclude_private: conf.exclude_private,
        exclude_ipv4_bogons: conf.exclude_ipv4_bogons,
        exclude_ipv6_bogons: conf.exclude_ipv6_bogons,
        exclude_ipv4_networks_from_url: non_empty(&conf.exclude_ipv4_networks_from_url),
        exclude_ipv6_networks_from_url: non_empty(&conf.exclude_ipv6_networks_from_url),
        include_asns_from_url: non_empty(&conf.include_asns_from_url),
        default_exclude_ipv4_networks: default_v4,
        default_exclude_ipv6_networks: default_v6,
        static_include_asns: conf.include_asns().map(|v| v.into_iter().collect()),
        static_exclude_asns: conf.exclude_asns().map(|v| v.into_iter().collect()),
    };

    let asn_db = std::env::var("GEOLITE_ASN_DB").ok();
    let asn: Arc<dyn gossipmap_filter::AsnResolver> = match asn_db {
        Some(path) => Arc::new(MaxMindAsnResolver::open(std::path::Path::new(&path))?),
        None => Arc::new(NoAsnResolver),
    };

    Ok(Filter::new(policy, asn, Arc::new(HttpPolicyFeed::new())))
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Clears all per-cycle coordination state, the way `main`'s master branch
/// does before the first `set_pending` (spec §6).
async fn reset_master_state(store: &dyn CoordinationStore) -> Result<(), gossipmap_store::StoreError> {
    store.set("crawl:master:state", "starting").await?;
    store.delete("up").await?;
    for key in store.scan_keys("node:*").await? {
        store.delete(&key).await?;
    }
    for key in store.scan_keys("crawl:cidr:*").await? {
        store.delete(&key).await?;
    }
    for key in store.scan_keys("peer:*").await? {
        store.delete(&key).await?;
    }
    store.delete("pending").await?;
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let conf = CrawlerConfig::load(&opts.config)?;
    let _logging_guard = logging::init(&conf.logfile, conf.log_to_console, conf.debug);
    info!(logfile = %conf.logfile, "log started, press CTRL+C to terminate");

    let magic_number = conf.magic_number()?;
    let store: Arc<dyn CoordinationStore> = Arc::new(RedisStore::connect(&redis_url(), conf.db).await?);
    let filter = build_filter(&conf)?;

    if opts.role.is_master() {
        reset_master_state(store.as_ref()).await?;
        let refresh_filter = filter.clone();
        tokio::task::spawn_blocking(move || refresh_filter.refresh()).await?;
        bootstrap::seed_pending(store.as_ref(), &filter, &conf).await?;
        store.set("crawl:master:state", "running").await?;
    }

    let conf = Arc::new(conf);
    let mut tasks = Vec::new();

    if opts.role.is_master() {
        let store = store.clone();
        let filter = filter.clone();
        let conf = conf.clone();
        tasks.push(tokio::spawn(async move { cron::run(store, filter, conf, magic_number).await }));
    }

    let worker_count = conf.workers.saturating_sub(if opts.role.is_master() { 1 } else { 0 }).max(1);
    info!(workers = worker_count + tasks.len(), "spawned");

    for _ in 0..worker_count {
        let store = store.clone();
        let filter = filter.clone();
        let conf = conf.clone();
        let role = opts.role;
        tasks.push(tokio::spawn(async move { worker::run(store, filter, conf, role, magic_number).await }));
    }

    for task in tasks {
        if let Err(err) = task.await? {
            error!(%err, "worker task exited");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    if !opts.config.exists() {
        eprintln!("Usage: gossipmap-crawler <config> <master|slave>");
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
