use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use clap::ValueEnum;

use crate::error::{HealthError, Result};
use crate::models::{DailyRecord, Metric, WeekKey, WeeklySummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum WeekPolicy {
    IsoWeek,
    #[default]
    WeekStart,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ActiveTime {
    #[default]
    Mean,
    Sum,
}

impl WeekPolicy {
    pub fn key(self, date: NaiveDate) -> WeekKey {
        match self {
            WeekPolicy::IsoWeek => {
                let week = date.iso_week();
                WeekKey::Iso(week.year() * 100 + week.week() as i32)
            }
            WeekPolicy::WeekStart => WeekKey::Start(week_start(date)),
        }
    }
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday();
    date.checked_sub_days(Days::new(offset.into())).unwrap_or(date)
}

#[derive(Default)]
struct Bucket {
    days: i64,
    sums: [i64; 5],
}

/// Does not re-validate; feed it the output of [`crate::validate::validate`].
pub fn aggregate(
    records: &[DailyRecord],
    policy: WeekPolicy,
    active_time: ActiveTime,
) -> Result<Vec<WeeklySummary>> {
    if records.is_empty() {
        return Err(HealthError::EmptyDataset);
    }

    let mut buckets: BTreeMap<WeekKey, Bucket> = BTreeMap::new();
    for record in records {
        let bucket = buckets.entry(policy.key(record.date)).or_default();
        bucket.days += 1;
        for (sum, metric) in bucket.sums.iter_mut().zip(Metric::ALL) {
            *sum += i64::from(record.value(metric));
        }
    }

    let summaries = buckets
        .into_iter()
        .map(|(key, bucket)| {
            let value = |metric: Metric| {
                let sum = bucket.sums[metric as usize];
                if metric == Metric::ActiveTime && active_time == ActiveTime::Sum {
                    i32::try_from(sum).unwrap_or(i32::MAX)
                } else {
                    mean_half_even(sum, bucket.days)
                }
            };
            WeeklySummary {
                key,
                days: bucket.days as usize,
                sleep_score: value(Metric::SleepScore),
                body_battery_max: value(Metric::BodyBatteryMax),
                body_battery_min: value(Metric::BodyBatteryMin),
                active_time: value(Metric::ActiveTime),
                defecation: value(Metric::Defecation),
            }
        })
        .collect();

    Ok(summaries)
}

/// `sum / count` rounded half to even, computed without floating point.
pub fn mean_half_even(sum: i64, count: i64) -> i32 {
    let quotient = sum.div_euclid(count);
    let twice_remainder = 2 * sum.rem_euclid(count);
    let rounded = if twice_remainder > count
        || (twice_remainder == count && quotient.rem_euclid(2) == 1)
    {
        quotient + 1
    } else {
        quotient
    };
    i32::try_from(rounded).unwrap_or(if rounded < 0 { i32::MIN } else { i32::MAX })
}
