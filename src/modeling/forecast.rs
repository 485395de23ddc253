use crate::modeling::decompose::{seasonal_trend, WEEKLY_PERIOD};
use crate::modeling::error::ModelError;
use crate::modeling::metrics::{
    mean_absolute_error, mean_relative_difference, mean_squared_error, r2_score,
};
use crate::modeling::series::{daily_series, DailySeries, PeriodEnd};
use crate::modeling::verbosity::QuietLogs;
use bon::{builder, Builder};
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::time::Instant;

/// A model that learns a daily series and predicts it on other dates.
///
/// Implement this to plug in an external forecasting library.
pub trait Forecaster {
    fn fit(&mut self, train: &DailySeries) -> Result<(), ModelError>;

    /// One prediction per date of `series`; its values are ignored but its
    /// regressors are used.
    fn predict(&self, series: &DailySeries) -> Result<Vec<f64>, ModelError>;
}

#[derive(Debug, Clone, PartialEq)]
struct FittedTrend {
    origin: NaiveDate,
    regressors: Vec<String>,
    coefficients: Vec<f64>,
}

/// Least-squares fit of a linear trend, day-of-week offsets and any regressors.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SeasonalTrendForecaster {
    /// Fit one offset per day of the week.
    #[builder(default = true)]
    pub weekly_seasonality: bool,
    /// Ridge penalty on every coefficient but the intercept.
    #[builder(default = 1e-6)]
    pub ridge: f64,
    #[builder(skip)]
    fitted: Option<FittedTrend>,
}

impl Default for SeasonalTrendForecaster {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SeasonalTrendForecaster {
    fn features(&self, origin: NaiveDate, date: NaiveDate, regressors: &[f64]) -> Vec<f64> {
        let mut row = vec![1.0, (date - origin).num_days() as f64];
        if self.weekly_seasonality {
            let weekday = date.weekday().num_days_from_monday() as usize;
            row.extend((1..7).map(|d| if d == weekday { 1.0 } else { 0.0 }));
        }
        row.extend_from_slice(regressors);
        row
    }

    fn regressor_rows(series: &DailySeries, names: &[String]) -> Result<Vec<Vec<f64>>, ModelError> {
        let columns: Vec<&Vec<f64>> = names
            .iter()
            .map(|name| {
                series
                    .regressors
                    .iter()
                    .find(|(n, values)| n == name && values.len() == series.len())
                    .map(|(_, values)| values)
                    .ok_or_else(|| ModelError::MissingRegressor(name.clone()))
            })
            .collect::<Result<_, _>>()?;
        Ok((0..series.len())
            .map(|i| columns.iter().map(|column| column[i]).collect())
            .collect())
    }
}

impl Forecaster for SeasonalTrendForecaster {
    fn fit(&mut self, train: &DailySeries) -> Result<(), ModelError> {
        let origin = train
            .first_date()
            .ok_or_else(|| ModelError::NoData("the training period".to_string()))?;
        let names: Vec<String> = train.regressors.iter().map(|(n, _)| n.clone()).collect();
        let regressors = Self::regressor_rows(train, &names)?;
        let design: Vec<Vec<f64>> = train
            .dates
            .iter()
            .zip(&regressors)
            .map(|(date, r)| self.features(origin, *date, r))
            .collect();
        let coefficients = least_squares(&design, &train.values, self.ridge)?;
        self.fitted = Some(FittedTrend {
            origin,
            regressors: names,
            coefficients,
        });
        Ok(())
    }

    fn predict(&self, series: &DailySeries) -> Result<Vec<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let regressors = Self::regressor_rows(series, &fitted.regressors)?;
        Ok(series
            .dates
            .iter()
            .zip(&regressors)
            .map(|(date, r)| {
                self.features(fitted.origin, *date, r)
                    .iter()
                    .zip(&fitted.coefficients)
                    .map(|(x, b)| x * b)
                    .sum()
            })
            .collect())
    }
}

/// Solves `(XᵀX + ridge·I′) b = Xᵀy`, where `I′` leaves the intercept unpenalized.
fn least_squares(design: &[Vec<f64>], y: &[f64], ridge: f64) -> Result<Vec<f64>, ModelError> {
    let k = design.first().map_or(0, Vec::len);
    let mut a = vec![vec![0.0; k + 1]; k];
    for (row, target) in design.iter().zip(y) {
        for i in 0..k {
            for j in 0..k {
                a[i][j] += row[i] * row[j];
            }
            a[i][k] += row[i] * target;
        }
    }
    for (i, equation) in a.iter_mut().enumerate().skip(1) {
        equation[i] += ridge;
    }

    for col in 0..k {
        let pivot = (col..k)
            .max_by(|&p, &q| a[p][col].abs().total_cmp(&a[q][col].abs()))
            .ok_or(ModelError::Singular)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(ModelError::Singular);
        }
        a.swap(col, pivot);
        for row in col + 1..k {
            let factor = a[row][col] / a[col][col];
            for c in col..=k {
                a[row][c] -= factor * a[col][c];
            }
        }
    }
    let mut solution = vec![0.0; k];
    for i in (0..k).rev() {
        let rest: f64 = (i + 1..k).map(|j| a[i][j] * solution[j]).sum();
        solution[i] = (a[i][k] - rest) / a[i][i];
    }
    Ok(solution)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastMetrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Mean of `(forecast - actual) / forecast` over the evaluation period.
    pub mean_diff: f64,
    /// Same ratio between the trends of forecast and actual series; `None` when the
    /// trends could not be computed.
    pub trend_diff: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ForecastReport<F> {
    pub model: F,
    pub train: DailySeries,
    pub eval: DailySeries,
    /// Predictions over the training and evaluation dates.
    pub forecast: DailySeries,
    /// Predictions over the evaluation dates only.
    pub eval_forecast: Vec<f64>,
    pub metrics: ForecastMetrics,
}

fn trend_bias(actual: &DailySeries, forecast: &DailySeries) -> Result<Option<f64>, ModelError> {
    let real = seasonal_trend(&actual.values, WEEKLY_PERIOD)?;
    let predicted = seasonal_trend(&forecast.values, WEEKLY_PERIOD)?;
    let real_by_date: HashMap<NaiveDate, f64> = actual
        .dates
        .iter()
        .zip(real)
        .filter_map(|(date, trend)| Some((*date, trend?)))
        .collect();
    let ratios: Vec<f64> = forecast
        .dates
        .iter()
        .zip(predicted)
        .filter_map(|(date, p)| {
            let p = p?;
            let r = real_by_date.get(date)?;
            Some((p - r) / p)
        })
        .collect();
    if ratios.is_empty() {
        return Ok(None);
    }
    Ok(Some(ratios.iter().sum::<f64>() / ratios.len() as f64))
}

/// Fits `model` on the daily series of `y` and scores it on an evaluation period.
///
/// The series is the daily mean of `data` (see [`daily_series`]). Training uses the
/// days in `[train_start, eval_start)`, evaluation the days in
/// `[eval_start, eval_end]`. `train_start` defaults to the first day and `eval_end`
/// to the last; `eval_end` may also be a span after `eval_start`.
///
/// With `verbose` off, only errors are logged for the duration of the call.
///
/// # Errors
///
/// [`ModelError::Frame`] when `y` or a regressor is missing from `data`, and
/// [`ModelError::NoData`] when either period has no complete day.
///
/// # Example
///
/// ```
/// use madrid_air_quality::{datetime_column, train_forecast, SeasonalTrendForecaster};
/// use chrono::NaiveDate;
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let days: Vec<_> = start.iter_days().take(60).map(|d| d.and_hms_opt(12, 0, 0).unwrap()).collect();
/// let no2: Vec<f64> = (0..60).map(|i| 30.0 + 0.1 * i as f64).collect();
/// let mut df = df!("no2" => no2)?;
/// df.with_column(datetime_column("time", &days)?)?;
///
/// let report = train_forecast(&df, "no2")
///     .eval_start(NaiveDate::from_ymd_opt(2023, 2, 15).unwrap())
///     .model(SeasonalTrendForecaster::default())
///     .call()?;
/// assert!(report.metrics.mae < 1e-6);
/// # Ok(())
/// # }
/// ```
#[builder]
pub fn train_forecast<F: Forecaster>(
    #[builder(start_fn)] data: &DataFrame,
    #[builder(start_fn)] y: &str,
    eval_start: NaiveDate,
    train_start: Option<NaiveDate>,
    #[builder(into)] eval_end: Option<PeriodEnd>,
    #[builder(default)] regressors: Vec<String>,
    model: F,
    #[builder(default = true)] verbose: bool,
) -> Result<ForecastReport<F>, ModelError> {
    let mut model = model;
    let _quiet = (!verbose).then(QuietLogs::new);

    let regressor_names: Vec<&str> = regressors.iter().map(String::as_str).collect();
    let series = daily_series(data, y, &regressor_names)?;
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return Err(ModelError::NoData(format!("'{y}'")));
    };
    let train_start = train_start.unwrap_or(first);
    let eval_end = eval_end.map_or(last, |end| end.resolve(eval_start));

    let train = series.filter_dates(|d| d >= train_start && d < eval_start);
    let eval = series.filter_dates(|d| d >= eval_start && d <= eval_end);
    if train.is_empty() {
        return Err(ModelError::NoData(format!("'{y}' in the training period")));
    }
    if eval.is_empty() {
        return Err(ModelError::NoData(format!("'{y}' in the evaluation period")));
    }

    let started = Instant::now();
    {
        let _fit_quiet = QuietLogs::new();
        model.fit(&train)?;
    }
    info!(
        "Model was fit in {:.2} seconds. Making predictions...",
        started.elapsed().as_secs_f64()
    );

    let mut forecast = train.concat(&eval);
    let predicted = model.predict(&forecast)?;
    if predicted.len() != forecast.len() {
        return Err(ModelError::PredictionLength {
            expected: forecast.len(),
            found: predicted.len(),
        });
    }
    forecast.values = predicted;
    let eval_forecast = forecast.values[train.len()..].to_vec();

    let trend_diff = match trend_bias(&series, &forecast) {
        Ok(bias) => bias,
        Err(e) => {
            warn!("Could not evaluate the trend: {e}");
            None
        }
    };
    let metrics = ForecastMetrics {
        mse: mean_squared_error(&eval.values, &eval_forecast),
        mae: mean_absolute_error(&eval.values, &eval_forecast),
        r2: r2_score(&eval.values, &eval_forecast),
        mean_diff: mean_relative_difference(&eval.values, &eval_forecast),
        trend_diff,
    };
    info!(
        "Evaluation complete. MSE={:.2}, MAE={:.2}, R2={:.2}",
        metrics.mse, metrics.mae, metrics.r2
    );
    info!(
        "Mean difference between forecast and actual: {:+.2}",
        metrics.mean_diff
    );

    Ok(ForecastReport {
        model,
        train,
        eval,
        forecast,
        eval_forecast,
        metrics,
    })
}
