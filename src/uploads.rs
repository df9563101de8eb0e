use crate::record::{TaskUpdate, UploadId, UploadStatus, UploadTask};
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

/// List of upload tasks shown to the user.
///
/// Every write is keyed by task id and only the pipeline run that created a
/// task ever writes to it, so concurrent uploads never contend for a task.
pub struct UploadTracker {
    tasks: watch::Sender<Vec<UploadTask>>,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self {
            tasks: watch::Sender::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.tasks.borrow().clone()
    }

    #[cfg(test)]
    pub fn get(&self, id: &UploadId) -> Option<UploadTask> {
        self.tasks.borrow().iter().find(|t| &t.id == id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadTask>> {
        self.tasks.subscribe()
    }

    pub fn add(&self, task: UploadTask) {
        self.tasks.send_modify(|tasks| tasks.push(task));
    }

    /// Merge `update` into the task with the given id. Unknown ids are ignored,
    /// as are writes to a task that already reached a terminal state.
    pub fn update(&self, id: &UploadId, update: TaskUpdate) {
        self.tasks.send_if_modified(|tasks| {
            let Some(task) = tasks.iter_mut().find(|t| &t.id == id) else {
                return false;
            };
            if task.status.is_terminal() {
                debug!("Ignoring update to finished upload {}", id);
                return false;
            }
            if let Some(progress) = update.progress {
                task.progress = task.progress.max(progress.min(100));
            }
            if let Some(status) = update.status {
                task.status = status;
            }
            if let Some(message) = update.message {
                task.message = Some(message);
            }
            if let Some(error) = update.error {
                task.error = Some(error);
            }
            true
        });
    }

    pub fn remove(&self, id: &UploadId) {
        self.tasks.send_if_modified(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| &t.id != id);
            tasks.len() != before
        });
    }

    /// User dismissal of a failed task. Returns false if no such failed task exists.
    pub fn dismiss(&self, id: &UploadId) -> bool {
        let mut dismissed = false;
        self.tasks.send_if_modified(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| !(&t.id == id && t.status == UploadStatus::Error));
            dismissed = tasks.len() != before;
            dismissed
        });
        dismissed
    }

    pub fn clear_completed(&self) {
        self.tasks.send_if_modified(|tasks| {
            let before = tasks.len();
            tasks.retain(|t| t.status != UploadStatus::Completed);
            tasks.len() != before
        });
    }

    /// Drop a completed task once `delay` has passed.
    pub fn remove_after(self: &Arc<Self>, id: UploadId, delay: Duration) {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            sleep(delay).await;
            tracker.remove(&id);
        });
    }
}

impl Default for UploadTracker {
    fn default() -> Self {
        Self::new()
    }
}
