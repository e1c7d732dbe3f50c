use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

use crate::error::{HealthError, Result};
use crate::models::{DailyRecord, Metric};

/// Fails on the first violation; on success hands back `records` untouched.
pub fn validate(records: Vec<DailyRecord>) -> Result<Vec<DailyRecord>> {
    {
        let by_date = index_by_date(&records)?;
        if let Some(err) = Violations::new(&by_date).next() {
            return Err(err);
        }
    }
    Ok(records)
}

pub fn audit(records: &[DailyRecord]) -> Result<Vec<HealthError>> {
    let by_date = match index_by_date(records) {
        Ok(by_date) => by_date,
        Err(HealthError::DuplicateDate(_)) => {
            // Report every duplicated date, then keep auditing the first copy of each.
            let mut errors = duplicate_dates(records);
            let mut first: BTreeMap<NaiveDate, &DailyRecord> = BTreeMap::new();
            for record in records {
                first.entry(record.date).or_insert(record);
            }
            errors.extend(Violations::new(&first));
            return Ok(errors);
        }
        Err(err) => return Err(err),
    };
    Ok(Violations::new(&by_date).collect())
}

fn index_by_date(records: &[DailyRecord]) -> Result<BTreeMap<NaiveDate, &DailyRecord>> {
    if records.is_empty() {
        return Err(HealthError::EmptyDataset);
    }
    let mut by_date = BTreeMap::new();
    for record in records {
        if by_date.insert(record.date, record).is_some() {
            return Err(HealthError::DuplicateDate(record.date));
        }
    }
    Ok(by_date)
}

fn duplicate_dates(records: &[DailyRecord]) -> Vec<HealthError> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.date).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(date, _)| HealthError::DuplicateDate(date))
        .collect()
}

fn range_violation(record: &DailyRecord, metric: Metric) -> Option<HealthError> {
    let value = record.value(metric);
    if metric.range().contains(&value) {
        None
    } else {
        Some(HealthError::RangeViolation {
            metric,
            date: record.date,
            value,
        })
    }
}

struct Violations<'a> {
    by_date: &'a BTreeMap<NaiveDate, &'a DailyRecord>,
    next_day: Option<NaiveDate>,
    last_day: NaiveDate,
    pending: Vec<HealthError>,
}

impl<'a> Violations<'a> {
    fn new(by_date: &'a BTreeMap<NaiveDate, &'a DailyRecord>) -> Self {
        let first = by_date.keys().next().copied();
        let last = by_date.keys().next_back().copied();
        Self {
            by_date,
            next_day: first,
            last_day: last.unwrap_or(NaiveDate::MIN),
            pending: Vec::new(),
        }
    }
}

impl Iterator for Violations<'_> {
    type Item = HealthError;

    fn next(&mut self) -> Option<HealthError> {
        loop {
            if !self.pending.is_empty() {
                return Some(self.pending.remove(0));
            }
            let day = self.next_day.filter(|day| *day <= self.last_day)?;
            self.next_day = day.checked_add_days(Days::new(1));

            match self.by_date.get(&day) {
                None => return Some(HealthError::MissingDate(day)),
                Some(record) => {
                    self.pending = Metric::ALL
                        .iter()
                        .filter_map(|metric| range_violation(record, *metric))
                        .collect();
                }
            }
        }
    }
}
