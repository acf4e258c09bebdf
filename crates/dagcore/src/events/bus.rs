use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a plan is executed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        targets: Vec<String>,
        planned_nodes: usize,
        timestamp: DateTime<Utc>,
    },
    ExecutionCompleted {
        execution_id: ExecutionId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    FunctionStarted {
        execution_id: ExecutionId,
        name: String,
        timestamp: DateTime<Utc>,
    },
    FunctionCompleted {
        execution_id: ExecutionId,
        name: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    FunctionFailed {
        execution_id: ExecutionId,
        name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// An intermediate value was dropped after its last consumer ran.
    ValueReleased {
        execution_id: ExecutionId,
        name: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for execution events
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Sends to current subscribers. Having none is not an error.
    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
