//! Asynchronous task events.

use crate::stream::StreamItem;
use crate::{DriverError, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Notification about a task, emitted on the driver-global event stream.
///
/// Consumers filter by `task_id`. Delivery is at-least-once; duplicates are
/// possible across a driver restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Task the event belongs to.
    pub task_id: TaskId,

    /// Task name.
    pub task_name: String,

    /// Allocation the task runs in.
    pub alloc_id: String,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,

    /// Human readable message.
    pub message: String,

    /// Free-form annotations.
    pub annotations: HashMap<String, String>,

    /// Set when the event stream failed; no more events follow.
    pub err: Option<DriverError>,
}

impl TaskEvent {
    /// Create a new event stamped with the current time.
    pub fn new(task_id: TaskId, task_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            alloc_id: String::new(),
            timestamp: Utc::now(),
            message: message.into(),
            annotations: HashMap::new(),
            err: None,
        }
    }

    /// Builder method to set the allocation id.
    pub fn with_alloc(mut self, alloc_id: impl Into<String>) -> Self {
        self.alloc_id = alloc_id.into();
        self
    }

    /// Builder method to add an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

impl StreamItem for TaskEvent {
    fn from_error(err: DriverError) -> Self {
        Self {
            task_id: TaskId::default(),
            task_name: String::new(),
            alloc_id: String::new(),
            timestamp: Utc::now(),
            message: err.to_string(),
            annotations: HashMap::new(),
            err: Some(err),
        }
    }

    fn error(&self) -> Option<&DriverError> {
        self.err.as_ref()
    }
}
