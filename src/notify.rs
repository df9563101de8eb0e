use crate::id::generate_id;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: String,
    pub message: String,
    pub kind: ToastKind,
}

/// Transient user-facing notifications.
#[derive(Default)]
pub struct ToastQueue {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: ToastKind, message: impl Into<String>) -> String {
        let toast = Toast {
            id: generate_id(),
            message: message.into(),
            kind,
        };
        let id = toast.id.clone();
        self.lock().push(toast);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> String {
        self.push(ToastKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> String {
        self.push(ToastKind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> String {
        self.push(ToastKind::Info, message)
    }

    pub fn dismiss(&self, id: &str) {
        self.lock().retain(|t| t.id != id);
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.lock().clone()
    }

    /// Take every pending toast, leaving the queue empty.
    #[cfg(test)]
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Toast>> {
        // A panic while holding the lock leaves a plain Vec behind; keep using it.
        self.toasts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
