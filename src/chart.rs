use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use tracing::{debug, warn};

use crate::error::{HealthError, Result};

/// One x-axis position of a chart: the bucket label and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub label: String,
    pub value: i32,
}

/// Destination for rendered line charts.
pub trait ChartSink {
    fn render_line_chart(&mut self, title: &str, series: &[SeriesPoint], path: &Path)
        -> Result<()>;
}

const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Fonts registered with plotters so far. Only one font backs `FONT_FAMILY` at a time;
/// files that failed once are not read again.
#[derive(Debug, Default)]
struct FontRegistry {
    active: Option<PathBuf>,
    rejected: HashSet<PathBuf>,
    warned: bool,
}

impl FontRegistry {
    fn select(
        &mut self,
        preferred: Option<&Path>,
        mut register: impl FnMut(&Path) -> bool,
    ) -> bool {
        if let Some(path) = preferred {
            if self.try_use(path, &mut register) {
                return true;
            }
        }
        if self.active.is_some() {
            return true;
        }
        if SYSTEM_FONTS
            .iter()
            .any(|path| self.try_use(Path::new(path), &mut register))
        {
            return true;
        }
        if !self.warned {
            warn!("no chart font found, rendering charts without text");
            self.warned = true;
        }
        false
    }

    fn try_use(&mut self, path: &Path, register: &mut impl FnMut(&Path) -> bool) -> bool {
        if self.active.as_deref() == Some(path) {
            return true;
        }
        if self.rejected.contains(path) {
            return false;
        }
        if register(path) {
            self.active = Some(path.to_path_buf());
            true
        } else {
            self.rejected.insert(path.to_path_buf());
            false
        }
    }
}

static FONTS: OnceLock<Mutex<FontRegistry>> = OnceLock::new();

fn register(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        debug!(font = %path.display(), "chart font not readable");
        return false;
    };
    // The font registry keeps `'static` slices.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            debug!(font = %path.display(), "chart font loaded");
            true
        }
        Err(_) => {
            warn!(font = %path.display(), "unusable chart font");
            false
        }
    }
}

/// Makes `preferred` the chart font when it loads, otherwise keeps the current one or
/// falls back to a system font. Returns whether any font is available.
fn load_font(preferred: Option<&Path>) -> bool {
    FONTS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .select(preferred, register)
}

/// Writes PNG line charts.
///
/// Titles and axis labels need a TrueType font; `font` is tried first, then a few common
/// system locations. Without one the chart is drawn without any text.
#[derive(Debug, Clone)]
pub struct PngChart {
    pub width: u32,
    pub height: u32,
    pub font: Option<PathBuf>,
}

impl Default for PngChart {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 576,
            font: None,
        }
    }
}

impl PngChart {
    pub fn with_font(font: Option<PathBuf>) -> Self {
        Self {
            font,
            ..Self::default()
        }
    }
}

fn value_range(series: &[SeriesPoint]) -> std::ops::Range<i32> {
    let min = series.iter().map(|p| p.value).min().unwrap_or(0);
    let max = series.iter().map(|p| p.value).max().unwrap_or(0);
    let pad = ((max - min) / 10).max(1);
    (min - pad)..(max + pad)
}

impl ChartSink for PngChart {
    fn render_line_chart(
        &mut self,
        title: &str,
        series: &[SeriesPoint],
        path: &Path,
    ) -> Result<()> {
        if series.is_empty() {
            return Err(HealthError::chart(format!("no points to plot for {title}")));
        }
        let chart_err = |e: &dyn std::fmt::Display| HealthError::chart(format!("{title}: {e}"));

        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| chart_err(&e))?;

        let with_text = load_font(self.font.as_deref());
        let last = (series.len() - 1).max(1) as i32;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(16);
        if with_text {
            builder
                .caption(title, (FONT_FAMILY, 24))
                .x_label_area_size(40)
                .y_label_area_size(48);
        }
        let mut chart = builder
            .build_cartesian_2d(0..last, value_range(series))
            .map_err(|e| chart_err(&e))?;

        if with_text {
            let label_at = |index: &i32| {
                usize::try_from(*index)
                    .ok()
                    .and_then(|i| series.get(i))
                    .map(|p| p.label.clone())
                    .unwrap_or_default()
            };
            chart
                .configure_mesh()
                .x_labels(series.len().min(12))
                .x_label_formatter(&label_at)
                .label_style((FONT_FAMILY, 12))
                .draw()
                .map_err(|e| chart_err(&e))?;
        }

        let points: Vec<(i32, i32)> = series
            .iter()
            .enumerate()
            .map(|(i, p)| (i as i32, p.value))
            .collect();
        chart
            .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
            .map_err(|e| chart_err(&e))?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|(x, y)| Circle::new((*x, *y), 3, BLUE.filled())),
            )
            .map_err(|e| chart_err(&e))?;

        root.present().map_err(|e| chart_err(&e))?;
        debug!(path = %path.display(), points = series.len(), "chart written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[i32]) -> Vec<SeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint {
                label: format!("2024-01-{:02}", 1 + 7 * i),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn value_range_pads_around_the_data() {
        assert_eq!(value_range(&series(&[70, 70])), 69..71);
        assert_eq!(value_range(&series(&[0, 100])), -10..110);
    }

    #[test]
    fn writes_a_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleep_score.png");
        PngChart::default()
            .render_line_chart("sleep_score", &series(&[70, 74, 68]), &path)
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn single_point_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defecation.png");
        PngChart {
            width: 320,
            height: 240,
            font: None,
        }
        .render_line_chart("defecation", &series(&[1]), &path)
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let err = PngChart::default()
            .render_line_chart("active_time", &[], &path)
            .unwrap_err();
        assert!(matches!(err, HealthError::Chart(_)));
        assert!(!path.exists());
    }

    #[test]
    fn renders_without_text_when_the_font_file_is_not_a_font() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("broken.ttf");
        std::fs::write(&font, b"not a font").unwrap();
        let path = dir.path().join("body_battery_max.png");

        PngChart {
            width: 320,
            height: 240,
            font: Some(font),
        }
        .render_line_chart("body_battery_max", &series(&[88, 92]), &path)
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn rejected_fonts_are_not_read_again() {
        let mut registry = FontRegistry::default();
        let mut attempts = Vec::new();
        let bad = Path::new("/fonts/bad.ttf");

        assert!(!registry.select(Some(bad), |p: &Path| {
            attempts.push(p.to_path_buf());
            false
        }));
        assert_eq!(attempts.len(), 1 + SYSTEM_FONTS.len());
        assert_eq!(attempts[0], bad);

        assert!(!registry.select(Some(bad), |p: &Path| {
            attempts.push(p.to_path_buf());
            false
        }));
        assert_eq!(attempts.len(), 1 + SYSTEM_FONTS.len());
    }

    #[test]
    fn each_chart_can_switch_to_its_own_font() {
        let mut registry = FontRegistry::default();
        let first = Path::new("/fonts/first.ttf");
        let second = Path::new("/fonts/second.ttf");
        let loads_any = |_: &Path| true;

        assert!(registry.select(Some(first), loads_any));
        assert_eq!(registry.active.as_deref(), Some(first));
        assert!(registry.select(None, |_: &Path| -> bool { unreachable!() }));
        assert!(registry.select(Some(second), loads_any));
        assert_eq!(registry.active.as_deref(), Some(second));

        let missing = Path::new("/fonts/missing.ttf");
        assert!(registry.select(Some(missing), |_: &Path| false));
        assert_eq!(registry.active.as_deref(), Some(second));
        assert!(registry.rejected.contains(missing));
    }
}
