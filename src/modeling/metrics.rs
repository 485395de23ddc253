//! Regression scores over paired actual/predicted values.
//!
//! All functions pair values positionally and stop at the shorter slice. Empty
//! input gives NaN.

fn pairs<'a>(actual: &'a [f64], predicted: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    actual.iter().copied().zip(predicted.iter().copied())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)))
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(pairs(actual, predicted).map(|(a, p)| (a - p).abs()))
}

/// Coefficient of determination.
///
/// A constant `actual` scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let actual_mean = mean(actual[..n].iter().copied());
    let residual: f64 = pairs(actual, predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let total: f64 = actual[..n].iter().map(|a| (a - actual_mean).powi(2)).sum();
    if total == 0.0 {
        return if residual == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - residual / total
}

/// Mean of `(predicted - actual) / predicted`; positive when the forecast runs high.
pub fn mean_relative_difference(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(pairs(actual, predicted).map(|(a, p)| (p - a) / p))
}
