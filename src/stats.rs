use crate::record::Plant;
use chrono::{DateTime, Duration, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct DailyCount {
    pub label: String,
    pub count: usize,
}

/// Aggregate figures over the whole collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantStats {
    pub total: usize,
    pub this_week: usize,
    pub avg_latitude: f64,
    pub avg_longitude: f64,
    /// New plants this week relative to everything before it, in percent.
    pub growth_rate: f64,
    /// The last seven days, oldest first.
    pub daily: Vec<DailyCount>,
}

fn day_label(day: NaiveDate) -> String {
    day.format("%b %d").to_string()
}

pub fn summarize(plants: &[Plant], now: DateTime<Utc>) -> PlantStats {
    let total = plants.len();
    let week_ago = now - Duration::days(7);
    let this_week = plants.iter().filter(|p| p.uploaded_at > week_ago).count();

    let (avg_latitude, avg_longitude) = if total > 0 {
        let lat: f64 = plants.iter().map(|p| p.latitude).sum();
        let lng: f64 = plants.iter().map(|p| p.longitude).sum();
        (lat / total as f64, lng / total as f64)
    } else {
        (0.0, 0.0)
    };

    let earlier = total.saturating_sub(this_week).max(1);
    let growth_rate = this_week as f64 / earlier as f64 * 100.0;

    let daily = (0..7)
        .rev()
        .map(|days_back| {
            let day = (now - Duration::days(days_back)).date_naive();
            let count = plants
                .iter()
                .filter(|p| p.uploaded_at.date_naive() == day)
                .count();
            DailyCount {
                label: day_label(day),
                count,
            }
        })
        .collect();

    PlantStats {
        total,
        this_week,
        avg_latitude,
        avg_longitude,
        growth_rate,
        daily,
    }
}
