use std::fmt::Write;

use crate::aggregate::{ActiveTime, WeekPolicy};
use crate::models::{DailyRecord, Metric, MetricStats, WeeklySummary};

pub fn describe(records: &[DailyRecord]) -> Vec<MetricStats> {
    Metric::ALL
        .iter()
        .map(|metric| {
            let values: Vec<i32> = records.iter().map(|r| r.value(*metric)).collect();
            let total: i64 = values.iter().map(|v| i64::from(*v)).sum();
            MetricStats {
                metric: *metric,
                count: values.len(),
                mean: if values.is_empty() {
                    0.0
                } else {
                    total as f64 / values.len() as f64
                },
                min: values.iter().copied().min().unwrap_or(0),
                max: values.iter().copied().max().unwrap_or(0),
            }
        })
        .collect()
}

fn policy_label(policy: WeekPolicy) -> &'static str {
    match policy {
        WeekPolicy::IsoWeek => "ISO week",
        WeekPolicy::WeekStart => "week starting",
    }
}

pub fn weekly_table(
    weeks: &[WeeklySummary],
    policy: WeekPolicy,
    active_time: ActiveTime,
) -> String {
    let mut output = String::new();
    let active_header = match active_time {
        ActiveTime::Mean => "active",
        ActiveTime::Sum => "active(sum)",
    };
    let _ = writeln!(
        output,
        "{:<13} {:>4} {:>6} {:>6} {:>6} {:>11} {:>6}",
        policy_label(policy),
        "days",
        "sleep",
        "bb max",
        "bb min",
        active_header,
        "defec"
    );
    let _ = writeln!(output, "{}", "-".repeat(59));
    for week in weeks {
        let _ = writeln!(
            output,
            "{:<13} {:>4} {:>6} {:>6} {:>6} {:>11} {:>6}",
            week.key.to_string(),
            week.days,
            week.sleep_score,
            week.body_battery_max,
            week.body_battery_min,
            week.active_time,
            week.defecation
        );
    }
    output
}

pub fn build_report(
    records: &[DailyRecord],
    weeks: &[WeeklySummary],
    policy: WeekPolicy,
    active_time: ActiveTime,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Health Summary");
    let first = records.iter().map(|r| r.date).min();
    let last = records.iter().map(|r| r.date).max();
    match (first, last) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                output,
                "{} daily records from {} to {} in {} weeks",
                records.len(),
                first,
                last,
                weeks.len()
            );
        }
        _ => {
            let _ = writeln!(output, "No daily records.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Statistics");
    for stats in describe(records) {
        let _ = writeln!(
            output,
            "- {}: mean {:.1} (min {}, max {}, n={})",
            stats.metric, stats.mean, stats.min, stats.max, stats.count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weeks");
    output.push_str(&weekly_table(weeks, policy, active_time));
    output
}
