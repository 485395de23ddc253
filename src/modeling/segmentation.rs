use crate::frame::{filter_by_label, require_columns};
use crate::modeling::error::ModelError;
use crate::modeling::series::{daily_means, PeriodEnd};
use crate::modeling::verbosity::QuietLogs;
use bon::{builder, Builder};
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::DataFrame;
use std::time::Instant;

pub const DEFAULT_SEGMENT_LOCATION_COLUMN: &str = "zone";
pub const DEFAULT_MAX_CHANGE_POINTS: usize = 10;
/// Window used when none is given and none can be inferred.
pub const DEFAULT_WINDOW_SIZE: usize = 10;
/// A lone change point closer than this to either end of the series is discarded.
pub const BOUNDARY_MARGIN_DAYS: i64 = 30;

/// Position of a structural change: the first index of the new segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangePoint {
    pub index: usize,
    pub score: f64,
}

/// Detects change points in an evenly spaced series.
///
/// Implement this to plug in an external segmentation library.
pub trait Segmenter {
    fn segment(
        &mut self,
        values: &[f64],
        window_size: usize,
        max_change_points: usize,
    ) -> Result<Vec<ChangePoint>, ModelError>;
}

/// Greedy binary segmentation on shifts of the mean.
///
/// Each step splits the segment whose best split removes the most squared error,
/// as long as that reduction beats `penalty · σ² · ln n`. Segments are never shorter
/// than the window size. Scores are the fraction of the total squared error removed.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct BinarySegmentation {
    #[builder(default = 3.0)]
    pub penalty: f64,
}

impl Default for BinarySegmentation {
    fn default() -> Self {
        Self::builder().build()
    }
}

struct PrefixSums {
    sum: Vec<f64>,
    squares: Vec<f64>,
}

impl PrefixSums {
    fn new(values: &[f64]) -> Self {
        let mut sum = vec![0.0];
        let mut squares = vec![0.0];
        for v in values {
            sum.push(sum[sum.len() - 1] + v);
            squares.push(squares[squares.len() - 1] + v * v);
        }
        Self { sum, squares }
    }

    /// Squared error of `values[start..end]` around its mean.
    fn cost(&self, start: usize, end: usize) -> f64 {
        let n = (end - start) as f64;
        let s = self.sum[end] - self.sum[start];
        self.squares[end] - self.squares[start] - s * s / n
    }
}

impl Segmenter for BinarySegmentation {
    fn segment(
        &mut self,
        values: &[f64],
        window_size: usize,
        max_change_points: usize,
    ) -> Result<Vec<ChangePoint>, ModelError> {
        if values.iter().any(|v| v.is_nan()) {
            return Err(ModelError::MissingValues);
        }
        let n = values.len();
        let window = window_size.max(1);
        if n < 2 * window {
            return Ok(Vec::new());
        }
        let sums = PrefixSums::new(values);
        let total = sums.cost(0, n);
        if total <= 0.0 {
            return Ok(Vec::new());
        }
        let threshold = self.penalty * (total / n as f64) * (n as f64).ln();

        let mut segments = vec![(0, n)];
        let mut found = Vec::new();
        while found.len() < max_change_points {
            let best = segments
                .iter()
                .enumerate()
                .filter(|(_, (start, end))| end - start >= 2 * window)
                .flat_map(|(s, &(start, end))| {
                    let sums = &sums;
                    (start + window..=end - window).map(move |k| {
                        let gain = sums.cost(start, end) - sums.cost(start, k) - sums.cost(k, end);
                        (s, k, gain)
                    })
                })
                .max_by(|a, b| a.2.total_cmp(&b.2));
            let Some((segment, split, gain)) = best else {
                break;
            };
            if gain <= threshold {
                break;
            }
            let (start, end) = segments[segment];
            segments[segment] = (start, split);
            segments.push((split, end));
            found.push(ChangePoint {
                index: split,
                score: gain / total,
            });
        }
        found.sort_by_key(|cp| cp.index);
        Ok(found)
    }
}

/// Lag with the strongest positive autocorrelation peak, searched up to half the
/// series length. `None` for short, constant or aperiodic series.
///
/// ```
/// use madrid_air_quality::dominant_window_size;
///
/// let weekly: Vec<f64> = (0..70).map(|i| (i as f64 * std::f64::consts::TAU / 7.0).sin()).collect();
/// assert_eq!(dominant_window_size(&weekly), Some(7));
/// ```
pub fn dominant_window_size(values: &[f64]) -> Option<usize> {
    let n = values.len();
    if n < 8 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let energy: f64 = centered.iter().map(|v| v * v).sum();
    if energy <= f64::EPSILON {
        return None;
    }
    let max_lag = n / 2;
    let acf: Vec<f64> = (0..=max_lag + 1)
        .map(|lag| {
            centered
                .iter()
                .zip(centered.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / energy
        })
        .collect();
    (2..=max_lag)
        .filter(|&lag| acf[lag] > 0.0 && acf[lag] > acf[lag - 1] && acf[lag] >= acf[lag + 1])
        .max_by(|&a, &b| acf[a].total_cmp(&acf[b]))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedChangePoint {
    pub date: NaiveDate,
    pub index: usize,
    pub value: f64,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SegmentationReport<S> {
    pub model: S,
    pub window_size: usize,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    /// Segment number of every day, starting at 0.
    pub segments: Vec<usize>,
    pub change_points: Vec<DetectedChangePoint>,
}

fn near_boundary(date: NaiveDate, first: NaiveDate, last: NaiveDate) -> bool {
    (date - first).num_days().abs() < BOUNDARY_MARGIN_DAYS
        || (date - last).num_days().abs() < BOUNDARY_MARGIN_DAYS
}

/// Segments the daily mean of `y` at one location.
///
/// Rows whose `location_by` column equals `location` are averaged per day over
/// `[train_start, train_end]` (defaults: first and last day; `train_end` may be a span
/// after the start), and days without a value are dropped. The window size is taken
/// from `window_size`, else inferred with [`dominant_window_size`], else 10.
///
/// A single change point within 30 days of either end of the series is treated as
/// an edge effect and discarded. With `verbose` off, only errors are logged for the
/// duration of the call.
///
/// # Errors
///
/// [`ModelError::Frame`] for missing columns, [`ModelError::NoData`] when the
/// location has no value in the window.
#[builder]
pub fn train_segmentation<S: Segmenter>(
    #[builder(start_fn)] data: &DataFrame,
    #[builder(start_fn)] y: &str,
    #[builder(start_fn)] location: &str,
    #[builder(into, default = DEFAULT_SEGMENT_LOCATION_COLUMN.to_string())] location_by: String,
    #[builder(default = DEFAULT_MAX_CHANGE_POINTS)] max_change_points: usize,
    window_size: Option<usize>,
    train_start: Option<NaiveDate>,
    #[builder(into)] train_end: Option<PeriodEnd>,
    segmenter: S,
    #[builder(default = true)] verbose: bool,
) -> Result<SegmentationReport<S>, ModelError> {
    let mut segmenter = segmenter;
    let _quiet = (!verbose).then(QuietLogs::new);

    require_columns(data, &[location_by.as_str()])?;
    let at_location = filter_by_label(data, &location_by, |value| value == location)?;
    let means = daily_means(&at_location, &[y])?;
    let no_data = || ModelError::NoData(format!("'{y}' at {location_by} {location} in the train period"));

    let first = train_start
        .or_else(|| means.keys().next().copied())
        .ok_or_else(no_data)?;
    let last = train_end
        .map(|end| end.resolve(first))
        .or_else(|| means.keys().next_back().copied())
        .ok_or_else(no_data)?;
    if first > last {
        return Err(no_data());
    }
    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = means
        .range(first..=last)
        .filter_map(|(date, day)| Some((*date, day[0]?)))
        .unzip();
    let (Some(&series_start), Some(&series_end)) = (dates.first(), dates.last()) else {
        return Err(no_data());
    };

    let window_size = match window_size.or_else(|| dominant_window_size(&values)) {
        Some(window) => window,
        None => {
            warn!("Could not find a dominant window size for {y}, using {DEFAULT_WINDOW_SIZE} days");
            DEFAULT_WINDOW_SIZE
        }
    };

    info!(
        "Segmenting {y} at {location_by} {location} with up to {max_change_points} change points"
    );
    let started = Instant::now();
    let mut found = {
        let _fit_quiet = QuietLogs::new();
        segmenter.segment(&values, window_size, max_change_points)?
    };
    info!("Model was fit in {:.2} seconds", started.elapsed().as_secs_f64());

    found.retain(|cp| cp.index < dates.len());
    let lone = match found.as_slice() {
        [only] => Some(dates[only.index]),
        _ => None,
    };
    if let Some(date) = lone.filter(|d| near_boundary(*d, series_start, series_end)) {
        warn!(
            "Discarding change point on {date} within {BOUNDARY_MARGIN_DAYS} days of the series boundary"
        );
        found.clear();
    }

    let segments: Vec<usize> = (0..dates.len())
        .map(|i| found.iter().filter(|cp| cp.index <= i).count())
        .collect();
    if found.is_empty() {
        warn!("No change points found for {y} at {location_by} {location} in the train period");
        warn!("Try a different window size");
    } else {
        info!("{} change point(s) detected", found.len());
    }
    let change_points = found
        .iter()
        .map(|cp| DetectedChangePoint {
            date: dates[cp.index],
            index: cp.index,
            value: values[cp.index],
            score: cp.score,
        })
        .collect();

    Ok(SegmentationReport {
        model: segmenter,
        window_size,
        dates,
        values,
        segments,
        change_points,
    })
}
