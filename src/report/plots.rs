//! PNG time-series charts for a single state.

use chrono::NaiveDate;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::AnnotationConfig;
use crate::error::{PipelineError, Result};
use crate::records::{NormalizedRecord, Prediction};

const PANEL_WIDTH: u32 = 800;
const HEIGHT: u32 = 800;
const EMPTY_VALUE_RANGE: (f64, f64) = (0.0, 1.0);

fn plot_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Plot(e.to_string())
}

/// One line on a chart.
pub struct Series {
    pub label: String,
    pub color: RGBColor,
    pub points: Vec<(NaiveDate, f64)>,
}

impl Series {
    fn new(label: &str, color: RGBColor, points: Vec<(NaiveDate, f64)>) -> Self {
        Self {
            label: label.to_string(),
            color,
            points,
        }
    }
}

/// Rows for `fips`, ordered by date.
pub fn state_rows(records: &[NormalizedRecord], fips: u32) -> Vec<&NormalizedRecord> {
    let mut rows: Vec<&NormalizedRecord> = records.iter().filter(|r| r.fips == fips).collect();
    rows.sort_by_key(|r| r.date);
    rows
}

/// First and last date over all series. A single day is widened by one day
/// so the axis has a non-empty range.
pub fn date_range(series: &[Series]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = series.iter().flat_map(|s| s.points.iter().map(|(d, _)| *d));
    let (start, end) = dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })?;

    if start == end {
        Some((start, end.succ_opt().unwrap_or(end)))
    } else {
        Some((start, end))
    }
}

/// Range of the finite values over all series, padded by 5% on each side.
pub fn value_range(series: &[Series]) -> Option<(f64, f64)> {
    let values = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, v)| *v))
        .filter(|v| v.is_finite());
    let (lo, hi) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;

    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    Some((lo - pad, hi + pad))
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    series: &[Series],
    annotation: &AnnotationConfig,
) -> Result<()> {
    let (start, end) =
        date_range(series).ok_or_else(|| PipelineError::EmptyDataset(title.to_string()))?;
    // all-NaN series (zero population) still get an empty panel
    let (y_min, y_max) = value_range(series).unwrap_or(EMPTY_VALUE_RANGE);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(70)
        .y_label_area_size(90)
        .build_cartesian_2d(start..end, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_labels(10)
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .x_desc("Date")
        .y_desc(y_desc)
        .draw()
        .map_err(plot_err)?;

    for s in series {
        let color = s.color;
        chart
            .draw_series(LineSeries::new(
                s.points.iter().copied().filter(|(_, v)| v.is_finite()),
                color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(s.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if (start..=end).contains(&annotation.date) {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(annotation.date, y_min), (annotation.date, y_max)],
                10,
                6,
                RED.stroke_width(2),
            ))
            .map_err(plot_err)?;
        chart
            .draw_series(std::iter::once(Text::new(
                annotation.label.clone(),
                (annotation.date, y_max),
                ("sans-serif", 16).into_font().color(&RED.mix(0.7)),
            )))
            .map_err(plot_err)?;
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }

    Ok(())
}

/// Draws two panels side by side into one PNG.
fn draw_pair(
    path: &Path,
    left: (&str, &str, &[Series]),
    right: (&str, &str, &[Series]),
    annotation: &AnnotationConfig,
) -> Result<()> {
    let root = BitMapBackend::new(path, (PANEL_WIDTH * 2, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let (left_area, right_area) = root.split_horizontally(PANEL_WIDTH);
    draw_panel(&left_area, left.0, left.1, left.2, annotation)?;
    draw_panel(&right_area, right.0, right.1, right.2, annotation)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn column(
    rows: &[&NormalizedRecord],
    value: impl Fn(&NormalizedRecord) -> f64,
) -> Vec<(NaiveDate, f64)> {
    rows.iter().map(|r| (r.date, value(*r))).collect()
}

/// Writes `<name>1.png` (case trend and positivity rate) and `<name>2.png`
/// (share of population at home and not at home) for one state.
#[tracing::instrument(skip(records, out_dir, annotation), fields(rows = records.len()))]
pub fn basic_plots(
    records: &[NormalizedRecord],
    fips: u32,
    name: &str,
    out_dir: &Path,
    annotation: &AnnotationConfig,
) -> Result<Vec<PathBuf>> {
    let rows = state_rows(records, fips);
    if rows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!("no rows for fips {fips}")));
    }

    let cases = [Series::new(
        "positiveIncrease",
        BLUE,
        column(&rows, |r| r.positive_increase),
    )];
    let positivity = [Series::new(
        "positivity_rate",
        BLUE,
        column(&rows, |r| r.positivity_rate),
    )];
    let at_home = [Series::new(
        "at_home_percent",
        BLUE,
        column(&rows, |r| r.at_home_percent),
    )];
    let not_at_home = [Series::new(
        "not_at_home_percent",
        BLUE,
        column(&rows, |r| r.not_at_home_percent),
    )];

    let first = out_dir.join(format!("{name}1.png"));
    draw_pair(
        &first,
        ("COVID Trends Across Time", "Number of COVID Cases", &cases),
        (
            "COVID Positivity Rate Across Time",
            "Number of COVID Cases per capita",
            &positivity,
        ),
        annotation,
    )?;

    let second = out_dir.join(format!("{name}2.png"));
    draw_pair(
        &second,
        (
            "Population at Home",
            "Percentage of total population at home",
            &at_home,
        ),
        (
            "Population Not at Home",
            "Percentage of total population not at home",
            &not_at_home,
        ),
        annotation,
    )?;

    info!(fips, first = %first.display(), second = %second.display(), "Wrote state plots");
    Ok(vec![first, second])
}

/// Writes `<name>.png` comparing actual and predicted case counts for one state.
#[tracing::instrument(skip(predictions, out_dir, annotation), fields(rows = predictions.len()))]
pub fn prediction_plot(
    predictions: &[Prediction],
    fips: u32,
    name: &str,
    out_dir: &Path,
    annotation: &AnnotationConfig,
) -> Result<PathBuf> {
    let mut rows: Vec<&Prediction> = predictions.iter().filter(|p| p.fips == fips).collect();
    if rows.is_empty() {
        return Err(PipelineError::EmptyDataset(format!(
            "no predictions for fips {fips}"
        )));
    }
    rows.sort_by_key(|p| p.date);

    let series = [
        Series::new(
            "Actual Number of Covid Cases",
            BLUE,
            rows.iter().map(|p| (p.date, p.positive_increase)).collect(),
        ),
        Series::new(
            "Predicted Covid Cases",
            GREEN,
            rows.iter().map(|p| (p.date, p.prediction)).collect(),
        ),
    ];

    let path = out_dir.join(format!("{name}.png"));
    {
        let root = BitMapBackend::new(&path, (PANEL_WIDTH * 2, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        draw_panel(
            &root,
            "COVID Trends Across Time vs. Predicted Trends",
            "Number of COVID Cases",
            &series,
            annotation,
        )?;
        root.present().map_err(plot_err)?;
    }

    info!(fips, path = %path.display(), "Wrote prediction plot");
    Ok(path)
}
