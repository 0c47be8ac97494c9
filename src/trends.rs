//! Trend and pattern analysis over daily records.
//!
//! All functions take a chronologically ordered slice of records (oldest
//! first) and are pure. Division-by-zero hazards (empty series, zero
//! previous-window average) resolve to 0 rather than NaN or an error.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::config::PatternsConfig;
use crate::types::DailyRecord;

/// Percent change of each core metric between the most recent window and the
/// window before it.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricTrends {
    pub mood: f64,
    pub energy: f64,
    pub stress: f64,
}

/// Percent change from `previous_avg` to `recent_avg`. A zero previous
/// average reports 0.
pub fn pct_change(recent_avg: f64, previous_avg: f64) -> f64 {
    if previous_avg == 0.0 {
        0.0
    } else {
        (recent_avg - previous_avg) / previous_avg * 100.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Compare the last `window` records against the `window` records before
/// them. Either window being empty yields all-zero trends.
pub fn windowed_trends(records: &[DailyRecord], window: usize) -> MetricTrends {
    if window == 0 || records.len() < 2 {
        return MetricTrends::default();
    }
    let split = records.len().saturating_sub(window);
    let recent = &records[split..];
    let previous_start = split.saturating_sub(window);
    let previous = &records[previous_start..split];
    if recent.is_empty() || previous.is_empty() {
        return MetricTrends::default();
    }

    let avg_of = |slice: &[DailyRecord], f: fn(&DailyRecord) -> f64| {
        mean(&slice.iter().map(f).collect::<Vec<_>>())
    };
    MetricTrends {
        mood: pct_change(
            avg_of(recent, |r| f64::from(r.mood)),
            avg_of(previous, |r| f64::from(r.mood)),
        ),
        energy: pct_change(
            avg_of(recent, |r| f64::from(r.energy)),
            avg_of(previous, |r| f64::from(r.energy)),
        ),
        stress: pct_change(
            avg_of(recent, |r| f64::from(r.stress)),
            avg_of(previous, |r| f64::from(r.stress)),
        ),
    }
}

/// Mood stability in [0, 100]: 100 minus ten times the population variance
/// of the mood series, floored at 0. An empty series reports 0.
pub fn mood_stability(records: &[DailyRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let moods: Vec<f64> = records.iter().map(|r| f64::from(r.mood)).collect();
    let avg = mean(&moods);
    let variance = moods.iter().map(|m| (m - avg).powi(2)).sum::<f64>() / moods.len() as f64;
    (100.0 - variance * 10.0).max(0.0)
}

/// Average mood and energy per weekday, rounded to one decimal. Only
/// weekdays with at least one record appear, ordered Monday through Sunday.
#[derive(Debug, Clone, Serialize)]
pub struct WeekdayAverages {
    pub weekday: String,
    pub mood: f64,
    pub energy: f64,
    pub samples: usize,
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn weekday_averages(records: &[DailyRecord]) -> Vec<WeekdayAverages> {
    let mut mood_sums = [0.0f64; 7];
    let mut energy_sums = [0.0f64; 7];
    let mut counts = [0usize; 7];
    for record in records {
        let idx = record.day.weekday().num_days_from_monday() as usize;
        mood_sums[idx] += f64::from(record.mood);
        energy_sums[idx] += f64::from(record.energy);
        counts[idx] += 1;
    }

    let weekdays = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    weekdays
        .iter()
        .enumerate()
        .filter(|(idx, _)| counts[*idx] > 0)
        .map(|(idx, weekday)| WeekdayAverages {
            weekday: weekday_name(*weekday).to_string(),
            mood: round1(mood_sums[idx] / counts[idx] as f64),
            energy: round1(energy_sums[idx] / counts[idx] as f64),
            samples: counts[idx],
        })
        .collect()
}

/// One classified day: the composite score averages mood, energy, and
/// inverted stress.
#[derive(Debug, Clone, Serialize)]
pub struct DayScore {
    pub day: NaiveDate,
    pub score: f64,
    pub mood: u8,
    pub energy: u8,
    pub stress: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DayBuckets {
    pub best: Vec<DayScore>,
    pub challenging: Vec<DayScore>,
}

/// Composite day score: (mood + energy + (11 - stress)) / 3, on a 1-10 scale.
pub fn day_score(mood: u8, energy: u8, stress: u8) -> f64 {
    (f64::from(mood) + f64::from(energy) + (11.0 - f64::from(stress))) / 3.0
}

/// Bucket days into best (score at or above the best threshold, highest
/// first) and challenging (at or below the challenging threshold, lowest
/// first), keeping `top_days` per bucket. Days scoring strictly between the
/// thresholds are in neither bucket.
pub fn classify_days(records: &[DailyRecord], config: &PatternsConfig) -> DayBuckets {
    let mut best = Vec::new();
    let mut challenging = Vec::new();
    for record in records {
        let score = day_score(record.mood, record.energy, record.stress);
        let entry = DayScore {
            day: record.day,
            score,
            mood: record.mood,
            energy: record.energy,
            stress: record.stress,
        };
        if score >= config.best_day_threshold {
            best.push(entry);
        } else if score <= config.challenging_day_threshold {
            challenging.push(entry);
        }
    }
    best.sort_by(|a, b| b.score.total_cmp(&a.score));
    challenging.sort_by(|a, b| a.score.total_cmp(&b.score));
    best.truncate(config.top_days);
    challenging.truncate(config.top_days);
    DayBuckets { best, challenging }
}

/// Longer-horizon progress composite: wellbeing delta between the first and
/// last windows, mood stability over the whole series, and energy/stress
/// movement between the earliest and latest windows.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProgressMetrics {
    pub wellbeing_delta: f64,
    pub mood_stability: f64,
    pub energy_trend: f64,
    pub stress_management: f64,
}

pub fn progress_metrics(records: &[DailyRecord], window: usize) -> ProgressMetrics {
    if records.is_empty() || window == 0 {
        return ProgressMetrics::default();
    }
    let earliest = &records[..window.min(records.len())];
    let latest = &records[records.len().saturating_sub(window)..];

    let avg_of = |slice: &[DailyRecord], f: fn(&DailyRecord) -> f64| {
        mean(&slice.iter().map(f).collect::<Vec<_>>())
    };

    let earliest_stress = avg_of(earliest, |r| f64::from(r.stress));
    let latest_stress = avg_of(latest, |r| f64::from(r.stress));
    // Stress improving means going down, so the sign is flipped.
    let stress_management = if earliest_stress == 0.0 {
        0.0
    } else {
        (earliest_stress - latest_stress) / earliest_stress * 100.0
    };

    ProgressMetrics {
        wellbeing_delta: avg_of(latest, |r| f64::from(r.wellbeing))
            - avg_of(earliest, |r| f64::from(r.wellbeing)),
        mood_stability: mood_stability(records),
        energy_trend: pct_change(
            avg_of(latest, |r| f64::from(r.energy)),
            avg_of(earliest, |r| f64::from(r.energy)),
        ),
        stress_management,
    }
}
