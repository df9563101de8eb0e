//! Remote collaborators: the image host, the location extractor and the
//! plant-data save endpoint.
//!
//! Each one sits behind a trait so the pipeline can be driven by the HTTP
//! implementations in production and by in-process fakes in tests.

use crate::error::{GeotagError, Result};
use crate::record::{
    HostedImage, LocationData, LocationRequest, LocationResponse, SavePlantRequest,
    SavePlantResponse, UploadFile,
};
use async_trait::async_trait;
use futures::stream;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.alumnx.com/api/hackathons";
pub const DEFAULT_HOST_URL: &str = "https://api.cloudinary.com";

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Receives upload progress as a percentage.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, file: &UploadFile, progress: ProgressFn) -> Result<HostedImage>;
}

#[async_trait]
pub trait LocationExtractor: Send + Sync {
    async fn extract(&self, request: &LocationRequest) -> Result<LocationResponse>;
}

/// Result of the best-effort remote save.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved(SavePlantResponse),
    /// The save did not happen; the plant is kept locally regardless.
    Skipped { reason: String },
}

#[async_trait]
pub trait PlantSaver: Send + Sync {
    async fn save(&self, request: &SavePlantRequest) -> SaveOutcome;
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("geotag/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GeotagError::Config(format!("Failed to create HTTP client: {}", e)))
}

async fn check_status(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GeotagError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        100
    } else {
        ((sent * 100) / total).min(100) as u8
    }
}

/// Unsigned uploads to a Cloudinary-compatible image host.
pub struct CloudinaryHost {
    client: Client,
    base_url: String,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryHost {
    pub fn new(client: Client, base_url: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.to_string(),
            upload_preset: upload_preset.to_string(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.base_url, self.cloud_name)
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, file: &UploadFile, progress: ProgressFn) -> Result<HostedImage> {
        let total = file.bytes.len() as u64;
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(<[u8]>::to_vec)
            .collect();

        let mut sent = 0u64;
        let body = stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress(percent(sent, total));
            Ok::<_, std::io::Error>(chunk)
        }));

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.name.clone());
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        debug!("Uploading {} ({} bytes) to {}", file.name, total, self.upload_url());
        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;
        let hosted: HostedImage = check_status("image host", response).await?.json().await?;

        info!(
            "Hosted {} as {} at {}",
            file.name, hosted.public_id, hosted.secure_url
        );
        Ok(hosted)
    }
}

/// Synthetic coordinates inside a fixed box (lat 15–35, lng 68–98), 6 decimals.
pub struct MockLocationExtractor {
    rng: Mutex<StdRng>,
}

impl MockLocationExtractor {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn coordinates(&self) -> (f64, f64) {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let latitude = 15.0 + rng.random::<f64>() * 20.0;
        let longitude = 68.0 + rng.random::<f64>() * 30.0;
        (round6(latitude), round6(longitude))
    }

    pub fn respond(&self, image_name: &str) -> LocationResponse {
        let (latitude, longitude) = self.coordinates();
        LocationResponse::found(LocationData {
            image_name: image_name.to_string(),
            latitude,
            longitude,
        })
    }
}

impl Default for MockLocationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationExtractor for MockLocationExtractor {
    async fn extract(&self, request: &LocationRequest) -> Result<LocationResponse> {
        Ok(self.respond(&request.image_name))
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Calls the extraction endpoint, answering with mock data whenever the
/// endpoint cannot be reached or answers with an error status. Any reply
/// the endpoint does give, `success: false` included, is passed through.
pub struct HttpLocationExtractor {
    client: Client,
    api_url: String,
    fallback: MockLocationExtractor,
}

impl HttpLocationExtractor {
    pub fn new(client: Client, api_url: &str, fallback: MockLocationExtractor) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            fallback,
        }
    }

    async fn request(&self, request: &LocationRequest) -> Result<LocationResponse> {
        let url = format!("{}/extract-latitude-longitude", self.api_url);
        let response = self.client.post(&url).json(request).send().await?;
        let text = check_status("location API", response).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl LocationExtractor for HttpLocationExtractor {
    async fn extract(&self, request: &LocationRequest) -> Result<LocationResponse> {
        match self.request(request).await {
            Ok(response) => Ok(response),
            // A body that is not a location reply is a real answer, not an outage.
            Err(e @ GeotagError::Json(_)) => Err(e),
            Err(e) => {
                warn!(
                    "Location API unavailable ({}), using mock location data for {}",
                    e, request.image_name
                );
                self.fallback.extract(request).await
            }
        }
    }
}

pub struct HttpPlantSaver {
    client: Client,
    api_url: String,
}

impl HttpPlantSaver {
    pub fn new(client: Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn request(&self, request: &SavePlantRequest) -> Result<SavePlantResponse> {
        let url = format!("{}/save-plant-location-data", self.api_url);
        let response = self.client.post(&url).json(request).send().await?;
        let body = check_status("save API", response).await?.json().await?;
        Ok(body)
    }
}

#[async_trait]
impl PlantSaver for HttpPlantSaver {
    async fn save(&self, request: &SavePlantRequest) -> SaveOutcome {
        match self.request(request).await {
            Ok(response) => SaveOutcome::Saved(response),
            Err(e) => {
                warn!("Save API unavailable ({}), plant data saved locally only", e);
                SaveOutcome::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Never contacts a server. Used when running offline.
pub struct LocalOnlySaver;

#[async_trait]
impl PlantSaver for LocalOnlySaver {
    async fn save(&self, _request: &SavePlantRequest) -> SaveOutcome {
        SaveOutcome::Skipped {
            reason: "offline".to_string(),
        }
    }
}
