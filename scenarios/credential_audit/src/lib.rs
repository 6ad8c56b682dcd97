//! Simulated credential stuffing audit against a pretend login endpoint. Measures how many of
//! a leaked credential set would have worked and whether lockout policies would have fired.

use std::time::Duration;

use rand::Rng;
use serde_json::json;

use arena_core::prelude::*;

fn load_leaked_set(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();
    let size = rng.gen_range(50..200);
    ctx.emit("leaked_set_loaded", json!({ "credentials": size }));
    Ok(json!({ "credentials": size }))
}

fn replay_attempts(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();

    let attempts = 25;
    let mut successes = 0;
    for attempt in 0..attempts {
        std::thread::sleep(Duration::from_millis(5));
        if rng.gen_bool(0.04) {
            successes += 1;
            ctx.emit("credential_accepted", json!({ "attempt": attempt }));
        }
    }

    Ok(json!({ "attempts": attempts, "accepted": successes }))
}

fn lockout_check(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    let mut rng = rand::thread_rng();
    let lockout_triggered = rng.gen_bool(0.8);
    ctx.emit("lockout_evaluated", json!({ "triggered": lockout_triggered }));
    Ok(json!({ "lockout_triggered": lockout_triggered }))
}

pub fn scenario() -> anyhow::Result<ScenarioDefinition> {
    ScenarioDefinition::builder("credential-audit", "Simulated credential stuffing audit")
        .with_description("Replays a simulated leaked credential set and checks lockout behaviour")
        .require_capability("network")
        .use_step("load_leaked_set", Duration::from_secs(2), load_leaked_set)
        .use_step("replay_attempts", Duration::from_secs(10), replay_attempts)
        .use_step("lockout_check", Duration::from_secs(2), lockout_check)
        .build()
}
