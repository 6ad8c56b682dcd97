//! Simulated blue-team log sweep: collect a window of synthetic auth logs, scan them for
//! indicators and raise findings for anything suspicious.

use std::time::Duration;

use rand::Rng;
use serde_json::json;

use arena_core::prelude::*;

const INDICATORS: [&str; 3] = ["repeated_auth_failure", "impossible_travel", "new_admin_grant"];

fn collect_logs(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();
    let lines = rng.gen_range(1_000..10_000);
    std::thread::sleep(Duration::from_millis(20));
    ctx.emit("logs_collected", json!({ "lines": lines }));
    Ok(json!({ "lines": lines }))
}

fn scan_indicators(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();

    let mut hits = Vec::new();
    for indicator in INDICATORS {
        std::thread::sleep(Duration::from_millis(10));
        if rng.gen_bool(0.3) {
            ctx.emit("indicator_hit", json!({ "indicator": indicator }));
            hits.push(indicator);
        }
    }

    Ok(json!({ "indicators": hits }))
}

fn raise_findings(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    ctx.emit("findings_raised", json!({}));
    Ok(json!({ "summary": "simulated sweep complete" }))
}

pub fn scenario() -> anyhow::Result<ScenarioDefinition> {
    ScenarioDefinition::builder("log-sweep", "Simulated log sweep")
        .with_description("Collects synthetic auth logs and scans them for attack indicators")
        .require_capability("log-access")
        .use_step("collect_logs", Duration::from_secs(5), collect_logs)
        .use_step("scan_indicators", Duration::from_secs(5), scan_indicators)
        .use_step("raise_findings", Duration::from_secs(1), raise_findings)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_has_the_expected_shape() {
        let definition = scenario().unwrap();
        assert_eq!(definition.id, ScenarioId::new("log-sweep"));
        assert_eq!(definition.steps.len(), 3);
        assert!(definition
            .required_capabilities
            .contains(&Capability::new("log-access")));
    }
}
