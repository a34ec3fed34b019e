//! gateway-cache - replay gateway dispatches through the cache.
//!
//! Reads newline-delimited dispatch records from stdin, applies them and
//! logs what ended up cached.
//!
//! ```text
//! {"op":0,"t":"GUILD_CREATE","s":1,"d":{...},"shard":0}
//! ```
//!
//! Records without an event name (heartbeats, hello, ...) are skipped.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::value::RawValue;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gateway_cache::utils::format_duration;
use gateway_cache::{BasicCacheRepo, Cache, CacheConfig, GatewayEvent, RepoConfig};

/// One line of input.
#[derive(Deserialize)]
struct Record<'a> {
    t: Option<String>,
    #[serde(borrow)]
    d: Option<&'a RawValue>,
    #[serde(default)]
    shard: u32,
}

fn parse_record(line: &str) -> anyhow::Result<Option<GatewayEvent>> {
    let record: Record<'_> = serde_json::from_str(line).context("invalid record")?;
    let (Some(name), Some(payload)) = (record.t, record.d) else {
        return Ok(None);
    };
    Ok(Some(GatewayEvent::new(
        name,
        payload.get().as_bytes(),
        record.shard,
    )))
}

fn describe(name: &str, repo: &RepoConfig) -> String {
    if repo.disabled {
        return format!("{name}: disabled");
    }
    let lifetime = repo
        .lifetime
        .map(format_duration)
        .unwrap_or_else(|| "none".to_string());
    format!("{name}: max={} lifetime={}", repo.max_entries, lifetime)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gateway_cache=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CacheConfig::from_env();
    info!("{}", describe("users", &config.users));
    info!("{}", describe("channels", &config.channels));
    info!("{}", describe("guilds", &config.guilds));
    info!("{}", describe("presences", &config.presences));

    let cache = Cache::new(config);
    let (tx, rx) = mpsc::channel(1024);

    let runner = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.run(rx).await })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no: u64 = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping replay");
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        line_no += 1;

        if line.trim().is_empty() {
            continue;
        }
        match parse_record(&line) {
            Ok(Some(event)) => tx.send(event).await.context("cache stopped")?,
            Ok(None) => {}
            Err(e) => warn!("Skipping line {}: {:#}", line_no, e),
        }
    }

    drop(tx);
    runner.await.context("event runner panicked")?;

    // Let queued cascades settle before reporting.
    tokio::time::sleep(Duration::from_millis(100)).await;
    cache.purge_expired();

    info!(
        "Replayed {} lines: users={} channels={} guilds={} presences={}",
        line_no,
        cache.users().size(),
        cache.channels().size(),
        cache.guilds().size(),
        cache.presences().size()
    );

    Ok(())
}
