// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier status` command implementation.
//!
//! Reads the persisted connection snapshot and reports whether it is stale,
//! then probes the health endpoint of a running server. Works whether or not
//! the server is up.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use courier_config::CourierConfig;
use courier_core::CourierError;
use courier_session::{SnapshotStore, StateSnapshot};
use serde::{Deserialize, Serialize};

/// Subset of the `/health` response the probe reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthProbe {
    status: String,
    uptime_secs: u64,
    provider: String,
    #[serde(default)]
    connection: Option<String>,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state_file: String,
    pub snapshot: Option<StateSnapshot>,
    pub snapshot_age_secs: Option<u64>,
    /// A `Connecting` snapshot older than the stale threshold.
    pub stale: bool,
    pub session_exists: bool,
    pub server: ServerProbe,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProbe {
    pub url: String,
    pub running: bool,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub connection: Option<String>,
    pub uptime_human: Option<String>,
}

/// Format seconds into a human-readable duration string.
fn format_uptime(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// A credential directory counts as present when it holds anything.
fn session_exists(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// The offline part of the report: snapshot and credentials on disk.
fn offline_report(config: &CourierConfig, now: DateTime<Utc>) -> StatusReport {
    let store = SnapshotStore::new(&config.session.state_file);
    let snapshot = store.load();
    let stale_after = Duration::from_secs(config.session.stale_connecting_secs);
    StatusReport {
        state_file: store.path().display().to_string(),
        snapshot_age_secs: snapshot.as_ref().map(|s| s.age(now).as_secs()),
        stale: snapshot
            .as_ref()
            .is_some_and(|s| s.is_stale(stale_after, now)),
        snapshot,
        session_exists: session_exists(Path::new(&config.session.session_path)),
        server: ServerProbe::default(),
    }
}

async fn probe_server(config: &CourierConfig) -> Result<ServerProbe, CourierError> {
    let url = format!("http://{}:{}/health", config.server.host, config.server.port);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| CourierError::Internal(format!("failed to create HTTP client: {e}")))?;

    let mut probe = ServerProbe {
        url: url.clone(),
        ..ServerProbe::default()
    };
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let health: HealthProbe = resp.json().await.map_err(|e| {
                CourierError::Internal(format!("failed to parse health response: {e}"))
            })?;
            probe.running = true;
            probe.status = Some(health.status);
            probe.provider = Some(health.provider);
            probe.connection = health.connection;
            probe.uptime_human = Some(format_uptime(health.uptime_secs));
        }
        Ok(resp) => {
            probe.status = Some(format!("HTTP {}", resp.status()));
        }
        Err(_) => {}
    }
    Ok(probe)
}

fn print_plain(report: &StatusReport) {
    println!("courier status");
    println!("  state file:  {}", report.state_file);
    match (&report.snapshot, report.snapshot_age_secs) {
        (Some(s), Some(age)) => println!(
            "  snapshot:    connected={} connecting={} attempts={} client={} (age {})",
            s.is_connected,
            s.is_connecting,
            s.reconnect_attempts,
            s.has_client,
            format_uptime(age)
        ),
        _ => println!("  snapshot:    none"),
    }
    println!("  stale:       {}", if report.stale { "yes" } else { "no" });
    println!(
        "  session:     {}",
        if report.session_exists {
            "credentials present"
        } else {
            "no credentials"
        }
    );

    let server = &report.server;
    if server.running {
        println!(
            "  server:      running ({}, provider {}, connection {}, up {})",
            server.status.as_deref().unwrap_or("?"),
            server.provider.as_deref().unwrap_or("?"),
            server.connection.as_deref().unwrap_or("n/a"),
            server.uptime_human.as_deref().unwrap_or("?"),
        );
    } else {
        match &server.status {
            Some(status) => println!("  server:      unhealthy at {} ({status})", server.url),
            None => println!("  server:      not reachable at {}", server.url),
        }
    }
}

/// Run the `courier status` command.
pub async fn run_status(config: &CourierConfig, json: bool) -> Result<(), CourierError> {
    let mut report = offline_report(config, Utc::now());
    report.server = probe_server(config).await?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CourierError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
    } else {
        print_plain(&report);
    }
    Ok(())
}
