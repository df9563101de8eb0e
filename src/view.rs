//! Terminal rendering of upload progress. Read-only over the task list.

use crate::record::{UploadId, UploadStatus, UploadTask};
use crate::uploads::UploadTracker;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

struct Bars {
    multi: MultiProgress,
    bars: HashMap<UploadId, ProgressBar>,
    style: ProgressStyle,
}

impl Bars {
    fn render(&mut self, tasks: &[UploadTask]) {
        for task in tasks {
            let bar = self.bars.entry(task.id.clone()).or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(self.style.clone());
                bar.set_prefix(task.file_name.clone());
                bar
            });
            if bar.is_finished() {
                continue;
            }

            bar.set_position(u64::from(task.progress));
            match task.status {
                UploadStatus::Completed => bar.finish_with_message("done"),
                UploadStatus::Error => bar.abandon_with_message(format!(
                    "error: {}",
                    task.error.as_deref().unwrap_or("upload failed")
                )),
                status => bar.set_message(
                    task.message
                        .clone()
                        .unwrap_or_else(|| status.label().to_string()),
                ),
            }
        }
    }
}

/// One progress bar per upload task, redrawn whenever the tracker changes.
pub struct ProgressView {
    bars: Arc<Mutex<Bars>>,
    handle: JoinHandle<()>,
}

impl ProgressView {
    pub fn spawn(tracker: &UploadTracker) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:>20} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        let bars = Arc::new(Mutex::new(Bars {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            style,
        }));

        let mut rx = tracker.subscribe();
        let shared = Arc::clone(&bars);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let tasks = rx.borrow_and_update().clone();
                if let Ok(mut bars) = shared.lock() {
                    bars.render(&tasks);
                }
            }
        });

        Self { bars, handle }
    }

    /// Stop following the tracker and draw its final state.
    pub fn finish(self, tasks: &[UploadTask]) {
        self.handle.abort();
        if let Ok(mut bars) = self.bars.lock() {
            bars.render(tasks);
        }
    }
}
