use crate::api::{ImageHost, LocationExtractor, PlantSaver, ProgressFn, SaveOutcome};
use crate::error::{GeotagError, Result};
use crate::notify::ToastQueue;
use crate::record::{
    HostedImage, LocationRequest, Plant, PlantId, SavePlantRequest, TaskUpdate, UploadFile,
    UploadId, UploadStatus, UploadTask,
};
use crate::store::PlantStore;
use crate::uploads::UploadTracker;
use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

pub const DEFAULT_EMAIL: &str = "farmer@gmail.com";
const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpeg", "jpg", "png"];
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Completed(Plant),
    Failed(String),
}

/// `2^attempt * base_ms`, capped at one minute.
fn backoff_ms(attempt: u32, base_ms: u64) -> u64 {
    2_u64
        .checked_pow(attempt)
        .unwrap_or(u64::MAX)
        .saturating_mul(base_ms)
        .min(MAX_BACKOFF_MS)
}

/// Reads a photo from disk, refusing anything that is not a JPEG or PNG.
pub async fn read_upload_file(path: &Path) -> Result<UploadFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let accepted = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()));
    if !accepted {
        return Err(GeotagError::UnsupportedFile(name));
    }

    let bytes = tokio::fs::read(path).await?;
    Ok(UploadFile { name, bytes })
}

/// Drives photos through host → extract → save and records the results.
pub struct PlantUploader {
    host: Arc<dyn ImageHost>,
    extractor: Arc<dyn LocationExtractor>,
    saver: Arc<dyn PlantSaver>,
    plants: Arc<PlantStore>,
    tasks: Arc<UploadTracker>,
    toasts: Arc<ToastQueue>,
    email: String,
    pub(crate) base_delay: Duration,
    pub(crate) max_retries: u32,
    pub(crate) cleanup_delay: Duration,
}

impl PlantUploader {
    pub fn new(
        host: Arc<dyn ImageHost>,
        extractor: Arc<dyn LocationExtractor>,
        saver: Arc<dyn PlantSaver>,
        plants: Arc<PlantStore>,
        tasks: Arc<UploadTracker>,
        toasts: Arc<ToastQueue>,
    ) -> Self {
        Self {
            host,
            extractor,
            saver,
            plants,
            tasks,
            toasts,
            email: DEFAULT_EMAIL.to_string(),
            base_delay: Duration::from_millis(500),
            max_retries: 2,
            cleanup_delay: Duration::from_secs(3),
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.base_delay = Duration::from_millis(delay_ms);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    /// Upload one photo. Never fails: problems end up in the task's error
    /// field and in an error toast, and are returned as `Failed`.
    pub async fn upload_plant(&self, file: UploadFile) -> UploadOutcome {
        let upload_id = UploadId::generate();
        self.tasks.add(UploadTask::new(upload_id.clone(), &file.name));

        match self.run(&upload_id, &file).await {
            Ok(plant) => {
                self.tasks.update(
                    &upload_id,
                    TaskUpdate::status(UploadStatus::Completed, "Upload complete"),
                );
                self.toasts
                    .success(format!("Successfully uploaded {}", plant.image_name));
                self.tasks.remove_after(upload_id, self.cleanup_delay);
                UploadOutcome::Completed(plant)
            }
            Err(e) => {
                let reason = e.to_string();
                error!("Upload of {} failed: {}", file.name, reason);
                self.tasks.update(&upload_id, TaskUpdate::failed(reason.clone()));
                self.toasts
                    .error(format!("Failed to upload {}: {}", file.name, reason));
                UploadOutcome::Failed(reason)
            }
        }
    }

    async fn run(&self, upload_id: &UploadId, file: &UploadFile) -> Result<Plant> {
        let tasks = Arc::clone(&self.tasks);
        let progress_id = upload_id.clone();
        let progress: ProgressFn =
            Arc::new(move |p| tasks.update(&progress_id, TaskUpdate::progress(p)));

        let hosted = self.host_with_retry(file, progress).await?;

        self.tasks.update(
            upload_id,
            TaskUpdate::status(UploadStatus::Extracting, "Extracting location").with_progress(100),
        );

        let image_name = if hosted.original_filename.is_empty() {
            file.name.clone()
        } else {
            hosted.original_filename.clone()
        };
        let location = self
            .extractor
            .extract(&LocationRequest {
                email_id: self.email.clone(),
                image_name,
                image_url: hosted.secure_url.clone(),
            })
            .await?;
        if let Some(message) = &location.message {
            debug!("Location API said for {}: {}", file.name, message);
        }
        let location = location.accepted().ok_or_else(|| {
            GeotagError::Rejected("Failed to extract location data".to_string())
        })?;

        self.tasks.update(
            upload_id,
            TaskUpdate::status(UploadStatus::Saving, "Saving plant data"),
        );

        let request = SavePlantRequest {
            email_id: self.email.clone(),
            image_name: location.image_name,
            image_url: hosted.secure_url,
            latitude: location.latitude,
            longitude: location.longitude,
        };
        match self.saver.save(&request).await {
            SaveOutcome::Saved(response) => {
                debug!("Saved {} remotely: {}", request.image_name, response.message)
            }
            SaveOutcome::Skipped { reason } => {
                info!("Keeping {} locally only: {}", request.image_name, reason)
            }
        }

        let plant = Plant {
            id: PlantId::generate(),
            image_name: request.image_name,
            image_url: request.image_url,
            latitude: request.latitude,
            longitude: request.longitude,
            uploaded_at: Utc::now(),
        };
        self.plants.add_plant(plant.clone());
        Ok(plant)
    }

    /// Host the file, retrying transient failures with exponential backoff.
    async fn host_with_retry(&self, file: &UploadFile, progress: ProgressFn) -> Result<HostedImage> {
        let base_ms = self.base_delay.as_millis() as u64;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let jitter = if base_ms > 0 {
                    rand::rng().random_range(0..base_ms)
                } else {
                    0
                };
                let backoff_delay = Duration::from_millis(backoff_ms(attempt, base_ms) + jitter);
                info!(
                    "Retrying upload of {} (attempt {}) after {}ms delay",
                    file.name,
                    attempt + 1,
                    backoff_delay.as_millis()
                );
                sleep(backoff_delay).await;
            }

            match self.host.upload(file, Arc::clone(&progress)).await {
                Ok(hosted) => return Ok(hosted),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!("Upload of {} failed, retrying...: {}", file.name, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Upload several photos at once, at most `max_concurrent` in flight.
    pub async fn upload_many(&self, files: Vec<UploadFile>, max_concurrent: usize) -> Vec<UploadOutcome> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let total = files.len();

        let uploads = files.into_iter().map(|file| {
            let permit = Arc::clone(&semaphore);
            async move {
                let _permit = permit.acquire().await.ok();
                self.upload_plant(file).await
            }
        });
        let outcomes = join_all(uploads).await;

        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Completed(_)))
            .count();
        info!("Uploaded {} out of {} photos", completed, total);
        outcomes
    }
}
