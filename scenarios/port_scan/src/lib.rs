//! Simulated red-team port scan: sweep a pretend target, probe whatever looked open, then
//! summarise. No packets leave the process.

use std::time::Duration;

use rand::Rng;
use serde_json::json;

use arena_core::prelude::*;

const CANDIDATE_PORTS: [u16; 6] = [21, 22, 80, 443, 3306, 8080];

fn tcp_sweep(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();

    let mut open_ports = Vec::new();
    for port in CANDIDATE_PORTS {
        std::thread::sleep(Duration::from_millis(10));
        if rng.gen_bool(0.5) {
            ctx.emit("port_open", json!({ "port": port }));
            open_ports.push(port);
        }
    }

    Ok(json!({ "scanned": CANDIDATE_PORTS.len(), "open_ports": open_ports }))
}

fn service_probe(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();

    let banners = ["OpenSSH_9.6", "nginx/1.25.3", "MySQL 8.3.0"];
    let identified: Vec<&str> = banners
        .iter()
        .filter(|_| rng.gen_bool(0.7))
        .copied()
        .collect();
    for banner in &identified {
        ctx.emit("banner_grabbed", json!({ "banner": banner }));
    }
    std::thread::sleep(Duration::from_millis(30));

    Ok(json!({ "services": identified }))
}

fn report(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    ctx.emit("report_ready", json!({}));
    Ok(json!({ "summary": "simulated scan complete" }))
}

pub fn scenario() -> anyhow::Result<ScenarioDefinition> {
    ScenarioDefinition::builder("port-scan", "Simulated port scan")
        .with_description("Sweeps a simulated target for open TCP ports and probes the services behind them")
        .require_capability("network")
        .use_step("tcp_sweep", Duration::from_secs(5), tcp_sweep)
        .use_step("service_probe", Duration::from_secs(5), service_probe)
        .use_step("report", Duration::from_secs(1), report)
        .build()
}
