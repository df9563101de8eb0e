use crate::api::{DEFAULT_API_URL, DEFAULT_HOST_URL};
use crate::export::ExportFormat;
use crate::pipeline::DEFAULT_EMAIL;
use crate::store::{SortBy, SortOrder};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "geotag")]
#[command(about = "Upload geo-tagged plant photos and browse where they were taken")]
#[command(version)]
pub(crate) struct Args {
    /// Directory holding the saved plant collection
    #[arg(long, env = "GEOTAG_DATA_DIR", default_value = ".geotag", global = true)]
    pub data_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Upload photos and record their locations
    Upload(UploadArgs),

    /// List plants
    List(ViewArgs),

    /// Remove a plant by id
    Remove { id: String },

    /// Delete every plant
    Clear,

    /// Export the listed plants to a file
    Export {
        #[command(flatten)]
        view: ViewArgs,

        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Directory the export file is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show collection analytics
    Stats,
}

#[derive(ClapArgs)]
pub(crate) struct ViewArgs {
    /// Only show plants whose name contains this text (case-insensitive)
    #[arg(short, long, default_value = "")]
    pub search: String,

    #[arg(long, value_enum, default_value_t = SortBy::Date)]
    pub sort_by: SortBy,

    #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
    pub order: SortOrder,
}

#[derive(ClapArgs)]
pub(crate) struct UploadArgs {
    /// Photos to upload (.jpeg, .jpg or .png)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Base URL of the location API
    #[arg(long, env = "GEOTAG_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Email sent with every request
    #[arg(long, env = "GEOTAG_EMAIL", default_value = DEFAULT_EMAIL)]
    pub email: String,

    /// Base URL of the image host
    #[arg(long, env = "CLOUDINARY_URL_BASE", default_value = DEFAULT_HOST_URL)]
    pub host_url: String,

    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloud_name: String,

    #[arg(long, env = "CLOUDINARY_UPLOAD_PRESET")]
    pub upload_preset: String,

    /// Maximum number of concurrent uploads
    #[arg(short, long, default_value = "3")]
    pub concurrent: usize,

    /// Maximum number of retry attempts for the image host
    #[arg(short, long, default_value = "2")]
    pub retries: u32,

    /// Base delay between retries in milliseconds
    #[arg(short, long, default_value = "500")]
    pub delay: u64,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,

    /// How long a finished upload stays on screen, in milliseconds
    #[arg(long, default_value = "3000")]
    pub cleanup_delay: u64,

    /// Skip the location and save APIs and use generated coordinates
    #[arg(long)]
    pub offline: bool,

    /// Seed for generated coordinates
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_defaults() {
        let args = Args::try_parse_from([
            "geotag",
            "upload",
            "--cloud-name",
            "demo",
            "--upload-preset",
            "unsigned",
            "rose.jpg",
            "tulip.png",
        ])
        .unwrap();

        let Command::Upload(upload) = args.command else {
            panic!("expected upload");
        };
        assert_eq!(upload.files.len(), 2);
        assert_eq!(upload.concurrent, 3);
        assert_eq!(upload.retries, 2);
        assert_eq!(upload.cleanup_delay, 3000);
        assert!(!upload.offline);
    }

    #[test]
    fn test_view_options() {
        let args = Args::try_parse_from([
            "geotag", "list", "--search", "rose", "--sort-by", "location", "--order", "asc",
        ])
        .unwrap();

        let Command::List(view) = args.command else {
            panic!("expected list");
        };
        assert_eq!(view.search, "rose");
        assert_eq!(view.sort_by, SortBy::Location);
        assert_eq!(view.order, SortOrder::Asc);
    }

    #[test]
    fn test_export_format() {
        let args =
            Args::try_parse_from(["geotag", "export", "--format", "json", "-o", "out"]).unwrap();
        let Command::Export { format, output, view } = args.command else {
            panic!("expected export");
        };
        assert_eq!(format, ExportFormat::Json);
        assert_eq!(output, PathBuf::from("out"));
        assert_eq!(view.order, SortOrder::Desc);
    }
}
