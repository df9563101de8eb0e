mod api;
mod error;
mod export;
mod id;
mod notify;
mod parse;
mod persist;
mod pipeline;
mod record;
mod stats;
mod store;
mod uploads;
mod util;
mod view;

use crate::api::{
    CloudinaryHost, HttpLocationExtractor, HttpPlantSaver, LocalOnlySaver, LocationExtractor,
    MockLocationExtractor, PlantSaver,
};
use crate::notify::{ToastKind, ToastQueue};
use crate::parse::{Args, Command, UploadArgs, ViewArgs};
use crate::persist::Slot;
use crate::pipeline::{PlantUploader, UploadOutcome};
use crate::record::{PlantId, UploadStatus, UploadTask};
use crate::stats::PlantStats;
use crate::store::PlantStore;
use crate::uploads::UploadTracker;
use crate::util::{format_plant_row, init_logger, print_hms};
use crate::view::ProgressView;
use chrono::Utc;
use clap::Parser;
use log::warn;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Names of the files whose upload ended in an error.
pub fn get_failed_uploads(tasks: &[UploadTask]) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| t.status == UploadStatus::Error)
        .map(|t| t.file_name.clone())
        .collect()
}

fn apply_view(store: &PlantStore, view: &ViewArgs) {
    store.set_search_term(view.search.as_str());
    store.set_sort_by(view.sort_by);
    store.set_sort_order(view.order);
}

pub fn print_plants(store: &PlantStore) {
    let state = store.snapshot();
    if state.filtered_plants.is_empty() {
        if state.plants.is_empty() {
            println!("No plants yet");
        } else {
            println!("No plants match \"{}\"", state.search_term);
        }
        return;
    }

    for plant in &state.filtered_plants {
        println!("{}", format_plant_row(plant));
    }
    println!(
        "\nShowing {} of {} plants",
        state.filtered_plants.len(),
        state.plants.len()
    );
}

pub fn print_summary(stats: &PlantStats) {
    if stats.total == 0 {
        println!("No plants to summarize");
        return;
    }

    println!("\nSummary:");
    println!("Total plants: {}", stats.total);
    println!("This week: {}", stats.this_week);
    println!(
        "Farm center: {:.2}, {:.2}",
        stats.avg_latitude, stats.avg_longitude
    );
    println!("Growth rate: {:.0}%", stats.growth_rate);

    println!("Last 7 days:");
    for day in &stats.daily {
        println!("  {}: {}", day.label, day.count);
    }
}

fn print_toasts(toasts: &ToastQueue) {
    for toast in toasts.snapshot() {
        let marker = match toast.kind {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
        };
        println!("[{}] {}", marker, toast.message);
        toasts.dismiss(&toast.id);
    }
}

/// Drop finished tasks, print the failed ones and dismiss them.
/// Returns the names of the failed files.
fn report_failures(tasks: &UploadTracker) -> Vec<String> {
    tasks.clear_completed();
    let remaining = tasks.snapshot();
    for task in remaining.iter().filter(|t| t.status == UploadStatus::Error) {
        println!(
            "Failed {}: {}",
            task.file_name,
            task.error.as_deref().unwrap_or("unknown error")
        );
        tasks.dismiss(&task.id);
    }
    get_failed_uploads(&remaining)
}

async fn run_upload(
    store: Arc<PlantStore>,
    args: UploadArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = api::build_client(Duration::from_secs(args.timeout))?;
    let toasts = Arc::new(ToastQueue::new());
    let tasks = Arc::new(UploadTracker::new());

    let fallback = match args.seed {
        Some(seed) => MockLocationExtractor::seeded(seed),
        None => MockLocationExtractor::new(),
    };
    let (extractor, saver): (Arc<dyn LocationExtractor>, Arc<dyn PlantSaver>) = if args.offline {
        toasts.info("Offline: locations are generated, nothing is sent to the location API");
        (Arc::new(fallback), Arc::new(LocalOnlySaver))
    } else {
        (
            Arc::new(HttpLocationExtractor::new(client.clone(), &args.api_url, fallback)),
            Arc::new(HttpPlantSaver::new(client.clone(), &args.api_url)),
        )
    };
    let host = Arc::new(CloudinaryHost::new(
        client,
        &args.host_url,
        &args.cloud_name,
        &args.upload_preset,
    ));

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match pipeline::read_upload_file(path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                toasts.error(format!("Skipping {}: {}", path.display(), e));
            }
        }
    }

    let uploader = PlantUploader::new(
        host,
        extractor,
        saver,
        store,
        Arc::clone(&tasks),
        Arc::clone(&toasts),
    )
    .with_email(&args.email)
    .with_delay(args.delay)
    .with_max_retries(args.retries)
    .with_cleanup_delay(Duration::from_millis(args.cleanup_delay));

    let start = Instant::now();
    let progress = ProgressView::spawn(&tasks);
    let outcomes = uploader.upload_many(files, args.concurrent).await;
    progress.finish(&tasks.snapshot());

    print_hms(&start);
    print_toasts(&toasts);

    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, UploadOutcome::Completed(_)))
        .count();
    println!("Uploaded {} of {} photos", completed, args.files.len());

    let failed = report_failures(&tasks);
    if !failed.is_empty() {
        warn!("{} uploads failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logger(args.verbose);

    let store = Arc::new(PlantStore::new());
    let slot = Slot::plants(&args.data_dir);
    persist::restore(&store, &slot);
    let mirror = persist::spawn_mirror(&store, slot);

    let result = match args.command {
        Command::Upload(upload) => run_upload(Arc::clone(&store), upload).await,
        Command::List(view) => {
            apply_view(&store, &view);
            print_plants(&store);
            Ok(())
        }
        Command::Remove { id } => {
            if store.remove_plant(&PlantId(id.clone())) {
                println!("Removed {}", id);
            } else {
                println!("No plant with id {}", id);
            }
            Ok(())
        }
        Command::Clear => {
            let count = store.plants().len();
            store.delete_all_plants();
            println!("Deleted {} plants", count);
            Ok(())
        }
        Command::Export {
            view,
            format,
            output,
        } => {
            apply_view(&store, &view);
            export::export_plants(&store.filtered_plants(), format, &output)
                .map(|path| println!("Saved {}", path.display()))
                .map_err(Into::into)
        }
        Command::Stats => {
            print_summary(&stats::summarize(&store.plants(), Utc::now()));
            Ok(())
        }
    };

    // Closing the store lets the mirror flush the final list and stop.
    drop(store);
    mirror.await?;
    result
}
