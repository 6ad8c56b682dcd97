use std::sync::Arc;

use arena_engine::prelude::Engine;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}
