use std::fmt;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{HealthError, Result};

/// One day of tracked metrics, keyed by date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub sleep_score: i32,
    pub body_battery_max: i32,
    pub body_battery_min: i32,
    pub active_time: i32,
    pub defecation: i32,
}

impl DailyRecord {
    pub fn value(&self, metric: Metric) -> i32 {
        match metric {
            Metric::SleepScore => self.sleep_score,
            Metric::BodyBatteryMax => self.body_battery_max,
            Metric::BodyBatteryMin => self.body_battery_min,
            Metric::ActiveTime => self.active_time,
            Metric::Defecation => self.defecation,
        }
    }

    pub fn set_value(&mut self, metric: Metric, value: i32) {
        match metric {
            Metric::SleepScore => self.sleep_score = value,
            Metric::BodyBatteryMax => self.body_battery_max = value,
            Metric::BodyBatteryMin => self.body_battery_min = value,
            Metric::ActiveTime => self.active_time = value,
            Metric::Defecation => self.defecation = value,
        }
    }
}

/// The tracked numeric fields, declared in the order they are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    SleepScore,
    BodyBatteryMax,
    BodyBatteryMin,
    ActiveTime,
    Defecation,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::SleepScore,
        Metric::BodyBatteryMax,
        Metric::BodyBatteryMin,
        Metric::ActiveTime,
        Metric::Defecation,
    ];

    /// Column name, also used for chart file names.
    pub fn name(self) -> &'static str {
        match self {
            Metric::SleepScore => "sleep_score",
            Metric::BodyBatteryMax => "body_battery_max",
            Metric::BodyBatteryMin => "body_battery_min",
            Metric::ActiveTime => "active_time",
            Metric::Defecation => "defecation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::SleepScore => "Sleep score",
            Metric::BodyBatteryMax => "Body battery Max",
            Metric::BodyBatteryMin => "Body battery Min",
            Metric::ActiveTime => "Active time",
            Metric::Defecation => "Defecation",
        }
    }

    pub fn range(self) -> RangeInclusive<i32> {
        match self {
            Metric::SleepScore | Metric::BodyBatteryMax | Metric::BodyBatteryMin => 0..=100,
            Metric::ActiveTime => 0..=360,
            Metric::Defecation => 0..=5,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bucket identifier for a weekly summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum WeekKey {
    /// `iso_year * 100 + iso_week`, e.g. 202401.
    Iso(i32),
    /// The Monday on or before the bucketed dates.
    Start(NaiveDate),
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekKey::Iso(key) => write!(f, "{key}"),
            WeekKey::Start(monday) => write!(f, "{monday}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub key: WeekKey,
    pub days: usize,
    pub sleep_score: i32,
    pub body_battery_max: i32,
    pub body_battery_min: i32,
    pub active_time: i32,
    pub defecation: i32,
}

impl WeeklySummary {
    pub fn value(&self, metric: Metric) -> i32 {
        match metric {
            Metric::SleepScore => self.sleep_score,
            Metric::BodyBatteryMax => self.body_battery_max,
            Metric::BodyBatteryMin => self.body_battery_min,
            Metric::ActiveTime => self.active_time,
            Metric::Defecation => self.defecation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricStats {
    pub metric: Metric,
    pub count: usize,
    pub mean: f64,
    pub min: i32,
    pub max: i32,
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| HealthError::InvalidDate(value.to_string()))
}
