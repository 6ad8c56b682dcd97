use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::StepContext;

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct ScenarioId(String);

impl ScenarioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A capability a scenario needs from the worker pool, such as `network` or `log-access`.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The hook executed for one step of a scenario.
///
/// Step hooks are synchronous and run on a blocking thread, so they are free to sleep or make
/// blocking calls. The worker enforces the step timeout from the outside.
pub type StepFn = fn(&StepContext) -> anyhow::Result<serde_json::Value>;

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: StepId,
    pub name: String,
    pub timeout: Duration,
    pub run: StepFn,
}

impl StepDefinition {
    pub fn new(name: &str, timeout: Duration, run: StepFn) -> Self {
        Self {
            id: StepId::new(name),
            name: name.to_string(),
            timeout,
            run,
        }
    }

    /// A step that models work without doing any. Used for scenarios published over the API,
    /// which carry no executable hooks.
    pub fn simulated(name: &str, timeout: Duration) -> Self {
        Self::new(name, timeout, simulated_step)
    }

    pub fn summary(&self) -> StepSummary {
        StepSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

fn simulated_step(ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
    std::thread::sleep(Duration::from_millis(25));
    ctx.emit("simulated", serde_json::json!({ "step": ctx.step_id().as_str() }));
    Ok(serde_json::json!({ "simulated": true }))
}

/// A published attack or defense scenario: an ordered sequence of steps plus the capabilities
/// it needs from the worker pool.
///
/// Definitions are immutable once published to the registry. A changed scenario must be
/// published under a new id; the registry compares [ScenarioDefinition::fingerprint] to reject
/// divergent re-publishes of the same id.
#[derive(Debug, Clone)]
pub struct ScenarioDefinition {
    pub id: ScenarioId,
    pub name: String,
    pub version: u32,
    pub description: String,
    pub required_capabilities: BTreeSet<Capability>,
    pub steps: Vec<StepDefinition>,
}

impl ScenarioDefinition {
    pub fn builder(id: &str, name: &str) -> ScenarioDefinitionBuilder {
        ScenarioDefinitionBuilder::new(id, name)
    }

    /// Content fingerprint used for publish conflict detection.
    ///
    /// Deliberately ignores the step hook addresses: two definitions with the same shape are
    /// the same scenario as far as the registry is concerned.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.version.hash(&mut hasher);
        self.description.hash(&mut hasher);
        for capability in &self.required_capabilities {
            capability.hash(&mut hasher);
        }
        for step in &self.steps {
            step.name.hash(&mut hasher);
            step.timeout.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// The serializable shape of this definition, without the step hooks.
    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version,
            description: self.description.clone(),
            required_capabilities: self.required_capabilities.clone(),
            steps: self.steps.iter().map(StepDefinition::summary).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: ScenarioId,
    pub name: String,
    pub version: u32,
    pub description: String,
    pub required_capabilities: BTreeSet<Capability>,
    pub steps: Vec<StepSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub id: StepId,
    pub name: String,
    pub timeout_ms: u64,
}

/// The builder for a scenario definition.
///
/// This must be used by scenario crates to define the scenario they provide.
pub struct ScenarioDefinitionBuilder {
    id: ScenarioId,
    name: String,
    version: u32,
    description: String,
    required_capabilities: BTreeSet<Capability>,
    steps: Vec<StepDefinition>,
}

impl ScenarioDefinitionBuilder {
    /// Initialise a new scenario definition from its id and display name.
    ///
    /// Recommended id is `env!("CARGO_PKG_NAME")` so that the scenario id matches the crate
    /// that defines it.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: ScenarioId::new(id),
            name: name.to_string(),
            version: 1,
            description: String::new(),
            required_capabilities: BTreeSet::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Declare a capability the worker pool must offer before this scenario can be scheduled.
    pub fn require_capability(mut self, capability: &str) -> Self {
        self.required_capabilities.insert(Capability::new(capability));
        self
    }

    /// Append a step. Steps execute in the order they are added.
    pub fn use_step(mut self, name: &str, timeout: Duration, run: StepFn) -> Self {
        self.steps.push(StepDefinition::new(name, timeout, run));
        self
    }

    /// Append a step backed by the built-in simulated action. Used for scenarios published
    /// over the API, which cannot carry executable hooks.
    pub fn use_simulated_step(mut self, name: &str, timeout: Duration) -> Self {
        self.steps.push(StepDefinition::simulated(name, timeout));
        self
    }

    pub fn build(self) -> anyhow::Result<ScenarioDefinition> {
        if self.steps.is_empty() {
            anyhow::bail!("Scenario [{}] has no steps", self.id);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Step [{}] is already defined", step.name);
            }
        }

        Ok(ScenarioDefinition {
            id: self.id,
            name: self.name,
            version: self.version,
            description: self.description,
            required_capabilities: self.required_capabilities,
            steps: self.steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_step(_ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn other_step(_ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!("other"))
    }

    fn sample() -> ScenarioDefinition {
        ScenarioDefinition::builder("port-scan", "Port scan")
            .with_description("Simulated TCP sweep")
            .require_capability("network")
            .use_step("sweep", Duration::from_secs(5), noop_step)
            .use_step("report", Duration::from_secs(1), noop_step)
            .build()
            .unwrap()
    }

    #[test]
    fn build_rejects_empty_scenario() {
        let result = ScenarioDefinition::builder("empty", "Empty").build();
        assert!(result.is_err());
    }

    #[test]
    fn build_rejects_duplicate_step_names() {
        let result = ScenarioDefinition::builder("dup", "Dup")
            .use_step("sweep", Duration::from_secs(1), noop_step)
            .use_step("sweep", Duration::from_secs(2), noop_step)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn fingerprint_ignores_hook_addresses() {
        let a = sample();
        let mut b = sample();
        b.steps[0].run = other_step;
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample();
        let mut b = sample();
        b.steps[1].timeout = Duration::from_secs(30);
        assert_ne!(a.fingerprint(), b.fingerprint());

        let mut c = sample();
        c.version = 2;
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn summary_preserves_step_order() {
        let summary = sample().summary();
        let names: Vec<_> = summary.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sweep", "report"]);
        assert_eq!(summary.steps[0].timeout_ms, 5000);
    }
}
