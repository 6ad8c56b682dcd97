use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use arena_core::prelude::{ArenaError, ScenarioDefinition, ScenarioId, ScenarioSummary};

/// Holds published scenario definitions.
///
/// Definitions are immutable once published. Re-publishing identical content is a no-op so
/// that registration at startup stays idempotent; publishing different content under an
/// existing id is a conflict, because a changed scenario must get a new id.
#[derive(Debug, Default)]
pub struct ScenarioRegistry {
    scenarios: RwLock<HashMap<ScenarioId, Arc<ScenarioDefinition>>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, definition: ScenarioDefinition) -> Result<(), ArenaError> {
        let mut scenarios = self.scenarios.write();
        match scenarios.entry(definition.id.clone()) {
            Entry::Occupied(existing) => {
                if existing.get().fingerprint() == definition.fingerprint() {
                    Ok(())
                } else {
                    Err(ArenaError::Conflict(definition.id))
                }
            }
            Entry::Vacant(slot) => {
                log::info!("Published scenario {} v{}", definition.id, definition.version);
                slot.insert(Arc::new(definition));
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &ScenarioId) -> Result<Arc<ScenarioDefinition>, ArenaError> {
        self.scenarios
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ArenaError::ScenarioNotFound(id.clone()))
    }

    pub fn list(&self) -> Vec<ScenarioSummary> {
        let mut summaries: Vec<_> = self
            .scenarios
            .read()
            .values()
            .map(|definition| definition.summary())
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use arena_core::prelude::StepContext;

    fn noop(_ctx: &StepContext) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn sample(id: &str, timeout: Duration) -> ScenarioDefinition {
        ScenarioDefinition::builder(id, "Sample")
            .use_step("only", timeout, noop)
            .build()
            .unwrap()
    }

    #[test]
    fn lookup_of_unknown_id_fails() {
        let registry = ScenarioRegistry::new();
        let err = registry.get(&ScenarioId::new("missing")).unwrap_err();
        assert!(matches!(err, ArenaError::ScenarioNotFound(_)));
    }

    #[test]
    fn republish_of_identical_content_is_noop() {
        let registry = ScenarioRegistry::new();
        registry.publish(sample("a", Duration::from_secs(1))).unwrap();
        registry.publish(sample("a", Duration::from_secs(1))).unwrap();
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn republish_of_divergent_content_conflicts() {
        let registry = ScenarioRegistry::new();
        registry.publish(sample("a", Duration::from_secs(1))).unwrap();
        let err = registry
            .publish(sample("a", Duration::from_secs(2)))
            .unwrap_err();
        assert!(matches!(err, ArenaError::Conflict(_)));
    }

    #[test]
    fn list_is_sorted_by_id() {
        let registry = ScenarioRegistry::new();
        registry.publish(sample("b", Duration::from_secs(1))).unwrap();
        registry.publish(sample("a", Duration::from_secs(1))).unwrap();

        let ids: Vec<_> = registry.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ScenarioId::new("a"), ScenarioId::new("b")]);
    }
}
