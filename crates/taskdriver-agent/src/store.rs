//! Persisted task handles.
//!
//! One JSON file per task, named after the task id. Handles are written via
//! a temporary file and a rename so a crash never leaves a torn handle.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use taskdriver_core::{DriverError, TaskHandle, TaskId};

use crate::error::AgentError;

const HANDLE_EXT: &str = "json";

/// Directory of persisted task handles.
#[derive(Debug, Clone)]
pub struct HandleStore {
    dir: PathBuf,
}

impl HandleStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, task_id: &TaskId) -> Result<PathBuf, AgentError> {
        if !task_id.is_file_safe() {
            return Err(DriverError::invalid_config(format!(
                "task id {:?} cannot be used as a handle file name",
                task_id.as_str()
            ))
            .into());
        }
        Ok(self.dir.join(format!("{task_id}.{HANDLE_EXT}")))
    }

    /// Persist `handle`, replacing any previous one for the task.
    pub async fn save(&self, handle: &TaskHandle) -> Result<(), AgentError> {
        let path = self.path(handle.task_id())?;
        let bytes = handle
            .to_bytes()
            .map_err(|e| AgentError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        debug!(task_id = %handle.task_id(), path = %path.display(), "Handle saved");
        Ok(())
    }

    /// Load the handle of one task.
    pub async fn load(&self, task_id: &TaskId) -> Result<TaskHandle, AgentError> {
        let path = self.path(task_id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentError::NoHandle(task_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        TaskHandle::from_bytes(&bytes).map_err(|e| AgentError::Serialization(e.to_string()))
    }

    /// Remove the handle of one task. Removing a missing handle succeeds.
    pub async fn remove(&self, task_id: &TaskId) -> Result<(), AgentError> {
        let path = self.path(task_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every stored handle. Unreadable files are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<TaskHandle>, AgentError> {
        let mut handles = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HANDLE_EXT) {
                continue;
            }
            let decoded = match fs::read(&path).await {
                Ok(bytes) => TaskHandle::from_bytes(&bytes),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read handle");
                    continue;
                }
            };
            match decoded {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupt handle"),
            }
        }
        handles.sort_by(|a, b| a.task_id().as_str().cmp(b.task_id().as_str()));
        Ok(handles)
    }
}
