use std::path::PathBuf;

use tracing::info;

use crate::aggregate::{aggregate, ActiveTime, WeekPolicy};
use crate::chart::{ChartSink, SeriesPoint};
use crate::db::HealthStore;
use crate::error::Result;
use crate::models::{DailyRecord, Metric, WeeklySummary};
use crate::validate::validate;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub policy: WeekPolicy,
    pub active_time: ActiveTime,
    pub out_dir: PathBuf,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub records: Vec<DailyRecord>,
    pub weeks: Vec<WeeklySummary>,
    pub charts: Vec<PathBuf>,
}

pub async fn weekly_summaries<S: HealthStore>(
    store: &S,
    policy: WeekPolicy,
    active_time: ActiveTime,
) -> Result<(Vec<DailyRecord>, Vec<WeeklySummary>)> {
    let records = store.list_all().await?;
    info!(records = records.len(), "extracted daily records");

    let records = validate(records)?;
    let weeks = aggregate(&records, policy, active_time)?;
    info!(weeks = weeks.len(), ?policy, ?active_time, "aggregated weekly summaries");
    Ok((records, weeks))
}

pub fn series_for(weeks: &[WeeklySummary], metric: Metric) -> Vec<SeriesPoint> {
    weeks
        .iter()
        .map(|week| SeriesPoint {
            label: week.key.to_string(),
            value: week.value(metric),
        })
        .collect()
}

pub async fn run_pipeline<S, C>(
    store: &S,
    sink: &mut C,
    options: &PipelineOptions,
) -> Result<PipelineRun>
where
    S: HealthStore,
    C: ChartSink,
{
    let (records, weeks) = weekly_summaries(store, options.policy, options.active_time).await?;

    std::fs::create_dir_all(&options.out_dir)?;
    let mut charts = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        let path = options.out_dir.join(format!("{}.png", metric.name()));
        sink.render_line_chart(metric.name(), &series_for(&weeks, metric), &path)?;
        charts.push(path);
    }
    info!(charts = charts.len(), out_dir = %options.out_dir.display(), "pipeline finished");

    Ok(PipelineRun {
        records,
        weeks,
        charts,
    })
}
