use crate::id::generate_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a stored plant record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantId(pub String);

/// Identifier of an upload task. Never compared against a `PlantId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl PlantId {
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

impl UploadId {
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// One geo-tagged photo accepted into the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: PlantId,
    pub image_name: String,
    pub image_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub uploaded_at: DateTime<Utc>,
}

impl Plant {
    /// Distance of the coordinate pair from (0, 0), used by the location sort.
    pub fn coordinate_magnitude(&self) -> f64 {
        (self.latitude.powi(2) + self.longitude.powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Extracting,
    Saving,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Extracting => "extracting",
            UploadStatus::Saving => "saving",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }
}

/// State of one in-flight or finished upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub id: UploadId,
    pub file_name: String,
    pub progress: u8,
    pub status: UploadStatus,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl UploadTask {
    pub fn new(id: UploadId, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            progress: 0,
            status: UploadStatus::Uploading,
            message: Some("Uploading image".to_string()),
            error: None,
        }
    }
}

/// Partial update applied to an upload task. `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub progress: Option<u8>,
    pub status: Option<UploadStatus>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn status(status: UploadStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(UploadStatus::Error),
            message: Some("Upload failed".to_string()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// A file picked for upload, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What the image host hands back for a stored image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostedImage {
    #[serde(default)]
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub original_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    pub email_id: String,
    pub image_name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub image_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Reply of the extraction endpoint. A rejection may omit `data` and carry
/// a `message` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<LocationData>,
}

impl LocationResponse {
    pub fn found(data: LocationData) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// The coordinates, if the endpoint accepted the image.
    pub fn accepted(self) -> Option<LocationData> {
        if self.success { self.data } else { None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePlantRequest {
    pub email_id: String,
    pub image_name: String,
    pub image_url: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Body returned by the save endpoint. Only `success` matters to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePlantResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_update: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_plant_uses_camel_case_fields() {
        let plant = Plant {
            id: PlantId("abc".to_string()),
            image_name: "red-rose.jpg".to_string(),
            image_url: "https://img.example/red-rose.jpg".to_string(),
            latitude: 3.0,
            longitude: 4.0,
            uploaded_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(&plant).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["imageName"], "red-rose.jpg");
        assert!(value.get("uploadedAt").is_some());
        assert_eq!(plant.coordinate_magnitude(), 5.0);
    }

    #[test]
    fn test_reads_browser_timestamp_format() {
        let json = r#"{"id":"x1","imageName":"a.jpg","imageUrl":"u","latitude":1.5,"longitude":2,"uploadedAt":"2024-05-01T08:00:00.000Z"}"#;
        let plant: Plant = serde_json::from_str(json).unwrap();
        assert_eq!(plant.uploaded_at, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert_eq!(plant.longitude, 2.0);
    }

    #[test]
    fn test_upload_task_starts_uploading_at_zero() {
        let task = UploadTask::new(UploadId("u1".to_string()), "leaf.png");
        assert_eq!(task.progress, 0);
        assert_eq!(task.status, UploadStatus::Uploading);
        assert!(task.error.is_none());
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn test_location_response_shape() {
        let json = r#"{"success":true,"data":{"imageName":"leaf","latitude":20.1,"longitude":77.2}}"#;
        let response: LocationResponse = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert_eq!(response.accepted().unwrap().image_name, "leaf");
    }

    #[test]
    fn test_rejection_without_data_decodes() {
        let json = r#"{"success":false,"message":"No GPS data found in image"}"#;
        let response: LocationResponse = serde_json::from_str(json).unwrap();
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("No GPS data found in image"));
        assert!(response.accepted().is_none());
    }

    #[test]
    fn test_rejection_with_data_is_not_accepted() {
        let json = r#"{"success":false,"data":{"imageName":"leaf","latitude":0,"longitude":0}}"#;
        let response: LocationResponse = serde_json::from_str(json).unwrap();
        assert!(response.accepted().is_none());
    }
}
