use std::fmt::Write;

use chrono::NaiveDate;

use crate::db::HealthStore;
use crate::error::{HealthError, Result};
use crate::models::{DailyRecord, Metric};

/// Field overrides for an update. `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub sleep_score: Option<i32>,
    pub body_battery_max: Option<i32>,
    pub body_battery_min: Option<i32>,
    pub active_time: Option<i32>,
    pub defecation: Option<i32>,
}

impl RecordPatch {
    pub fn get(&self, metric: Metric) -> Option<i32> {
        match metric {
            Metric::SleepScore => self.sleep_score,
            Metric::BodyBatteryMax => self.body_battery_max,
            Metric::BodyBatteryMin => self.body_battery_min,
            Metric::ActiveTime => self.active_time,
            Metric::Defecation => self.defecation,
        }
    }

    pub fn set(&mut self, metric: Metric, value: i32) {
        let slot = match metric {
            Metric::SleepScore => &mut self.sleep_score,
            Metric::BodyBatteryMax => &mut self.body_battery_max,
            Metric::BodyBatteryMin => &mut self.body_battery_min,
            Metric::ActiveTime => &mut self.active_time,
            Metric::Defecation => &mut self.defecation,
        };
        *slot = Some(value);
    }

    pub fn apply(&self, record: &mut DailyRecord) {
        for metric in Metric::ALL {
            if let Some(value) = self.get(metric) {
                record.set_value(metric, value);
            }
        }
    }
}

pub async fn create<S: HealthStore>(store: &S, record: &DailyRecord) -> Result<()> {
    store.insert(record).await
}

pub async fn read<S: HealthStore>(store: &S, date: NaiveDate) -> Result<DailyRecord> {
    store
        .get_by_date(date)
        .await?
        .ok_or(HealthError::NotFound(date))
}

pub async fn update<S: HealthStore>(
    store: &S,
    date: NaiveDate,
    patch: &RecordPatch,
) -> Result<(DailyRecord, DailyRecord)> {
    let before = read(store, date).await?;
    let mut after = before.clone();
    patch.apply(&mut after);
    store.upsert(&after).await?;
    Ok((before, after))
}

pub async fn delete<S: HealthStore>(store: &S, date: NaiveDate) -> Result<DailyRecord> {
    let existing = read(store, date).await?;
    if !store.delete(date).await? {
        return Err(HealthError::NotFound(date));
    }
    Ok(existing)
}

pub async fn list<S: HealthStore>(store: &S) -> Result<Vec<DailyRecord>> {
    store.list_all().await
}

pub fn format_record(record: &DailyRecord) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{:>16}: {}", "Date", record.date);
    for metric in Metric::ALL {
        let _ = writeln!(output, "{:>16}: {:3}", metric.label(), record.value(metric));
    }
    output
}

pub fn format_row(record: &DailyRecord) -> String {
    let mut line = record.date.to_string();
    for metric in Metric::ALL {
        let _ = write!(line, " {:4}", record.value(metric));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(date: NaiveDate) -> DailyRecord {
        DailyRecord {
            date,
            sleep_score: 82,
            body_battery_max: 95,
            body_battery_min: 21,
            active_time: 64,
            defecation: 1,
        }
    }

    #[tokio::test]
    async fn create_then_read_returns_the_record() {
        let store = MemoryStore::default();
        let record = sample(day(2024, 1, 1));
        create(&store, &record).await.unwrap();
        assert_eq!(read(&store, record.date).await.unwrap(), record);
    }

    #[tokio::test]
    async fn create_rejects_existing_date() {
        let store = MemoryStore::with_records([sample(day(2024, 1, 1))]);
        let mut other = sample(day(2024, 1, 1));
        other.sleep_score = 10;
        let err = create(&store, &other).await.unwrap_err();
        assert!(matches!(err, HealthError::DuplicateDate(d) if d == day(2024, 1, 1)));
        assert_eq!(read(&store, day(2024, 1, 1)).await.unwrap().sleep_score, 82);
    }

    #[tokio::test]
    async fn read_missing_date_is_not_found() {
        let store = MemoryStore::default();
        let err = read(&store, day(2024, 1, 9)).await.unwrap_err();
        assert!(matches!(err, HealthError::NotFound(d) if d == day(2024, 1, 9)));
        assert_eq!(err.to_string(), "Not found date: 2024-01-09");
    }

    #[tokio::test]
    async fn update_keeps_fields_not_in_patch() {
        let store = MemoryStore::with_records([sample(day(2024, 1, 1))]);
        let patch = RecordPatch {
            sleep_score: Some(60),
            defecation: Some(3),
            ..RecordPatch::default()
        };
        let (before, after) = update(&store, day(2024, 1, 1), &patch).await.unwrap();
        assert_eq!(before, sample(day(2024, 1, 1)));
        assert_eq!(after.sleep_score, 60);
        assert_eq!(after.defecation, 3);
        assert_eq!(after.body_battery_max, 95);
        assert_eq!(after.active_time, 64);
        assert_eq!(read(&store, day(2024, 1, 1)).await.unwrap(), after);
    }

    #[tokio::test]
    async fn update_missing_date_is_not_found() {
        let store = MemoryStore::default();
        let result = update(&store, day(2024, 1, 1), &RecordPatch::default()).await;
        assert!(matches!(result, Err(HealthError::NotFound(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn delete_returns_removed_record() {
        let store = MemoryStore::with_records([sample(day(2024, 1, 1)), sample(day(2024, 1, 2))]);
        let removed = delete(&store, day(2024, 1, 1)).await.unwrap();
        assert_eq!(removed.date, day(2024, 1, 1));
        assert_eq!(store.len(), 1);
        assert!(matches!(
            delete(&store, day(2024, 1, 1)).await,
            Err(HealthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_is_ordered_by_date() {
        let store = MemoryStore::with_records([
            sample(day(2024, 1, 3)),
            sample(day(2024, 1, 1)),
            sample(day(2024, 1, 2)),
        ]);
        let dates: Vec<NaiveDate> = list(&store).await.unwrap().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3)]);
    }

    #[test]
    fn patch_tracks_each_metric() {
        let mut patch = RecordPatch::default();
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            assert_eq!(patch.get(metric), None);
            patch.set(metric, i as i32);
        }
        let values: Vec<Option<i32>> = Metric::ALL.iter().map(|m| patch.get(*m)).collect();
        assert_eq!(values, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn record_block_aligns_labels() {
        let text = format_record(&sample(day(2024, 1, 1)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "            Date: 2024-01-01");
        assert_eq!(lines[1], "     Sleep score:  82");
        assert_eq!(lines[2], "Body battery Max:  95");
        assert_eq!(lines[4], "     Active time:  64");
        assert_eq!(lines[5], "      Defecation:   1");
    }

    #[test]
    fn list_row_pads_values() {
        assert_eq!(
            format_row(&sample(day(2024, 1, 1))),
            "2024-01-01   82   95   21   64    1"
        );
    }
}
