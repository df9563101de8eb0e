use crate::record::Plant;
use env_logger::Env;
use std::time::Instant;

pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
}

pub fn print_hms(start: &Instant) {
    let secs = start.elapsed().as_secs();
    println!(
        "Elapsed time: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
}

pub fn format_plant_row(plant: &Plant) -> String {
    format!(
        "{:<24} {:<32} {:>11.6} {:>11.6}  {}",
        plant.id,
        plant.image_name,
        plant.latitude,
        plant.longitude,
        plant.uploaded_at.format("%Y-%m-%d %H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::plant;

    #[test]
    fn test_format_plant_row() {
        let row = format_plant_row(&plant("abc", "rose.jpg", 0, 18.5, 73.25));
        assert!(row.starts_with("abc "));
        assert!(row.contains("rose.jpg"));
        assert!(row.contains("18.500000"));
        assert!(row.contains("73.250000"));
        assert!(row.ends_with("2024-06-01 12:00"));
    }
}
