use crate::error::{GeotagError, Result};
use crate::record::Plant;
use chrono::SecondsFormat;
use clap::ValueEnum;
use csv::Writer;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_FILENAME: &str = "plant-locations.csv";
pub const JSON_FILENAME: &str = "plant-locations.json";
const CSV_HEADER: [&str; 5] = ["Image Name", "Latitude", "Longitude", "Upload Date", "Image URL"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn filename(self) -> &'static str {
        match self {
            ExportFormat::Csv => CSV_FILENAME,
            ExportFormat::Json => JSON_FILENAME,
        }
    }
}

pub fn to_csv(plants: &[Plant]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for plant in plants {
        writer.write_record([
            plant.image_name.clone(),
            plant.latitude.to_string(),
            plant.longitude.to_string(),
            plant.uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            plant.image_url.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| GeotagError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn to_json(plants: &[Plant]) -> Result<String> {
    Ok(serde_json::to_string_pretty(plants)?)
}

/// Write the given view to `<dir>/<fixed filename>` and return the path.
pub fn export_plants(plants: &[Plant], format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    if plants.is_empty() {
        return Err(GeotagError::EmptyExport);
    }

    let content = match format {
        ExportFormat::Csv => to_csv(plants)?,
        ExportFormat::Json => to_json(plants)?,
    };

    fs::create_dir_all(dir)?;
    let path = dir.join(format.filename());
    fs::write(&path, content)?;
    info!("Exported {} plants to {}", plants.len(), path.display());
    Ok(path)
}
