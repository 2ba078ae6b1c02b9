use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CallbackHandler, RunContext};
use crate::Value;

/// Callback handler that remembers every root run started while it is
/// attached. Cloning shares the underlying record.
#[derive(Clone, Debug, Default)]
pub struct TraceCollector {
    runs: Arc<Mutex<Vec<RunContext>>>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RunContext>> {
        // A poisoned lock still holds a consistent list of contexts.
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn traced_runs(&self) -> Vec<RunContext> {
        self.lock().clone()
    }

    /// Id of the first root run recorded, if any.
    pub fn first_run_id(&self) -> Option<Uuid> {
        self.lock().first().map(|ctx| ctx.run_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl CallbackHandler for TraceCollector {
    async fn on_start(&self, ctx: &RunContext, _inputs: &Value) {
        if ctx.is_root() {
            self.lock().push(ctx.clone());
        }
    }

    async fn on_end(&self, _ctx: &RunContext, _outputs: &Value, _duration_ms: u128) {}

    async fn on_error(&self, _ctx: &RunContext, _error: &Value, _duration_ms: u128) {}
}
