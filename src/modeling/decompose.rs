use crate::modeling::error::ModelError;

/// Weekly seasonality of daily series.
pub const WEEKLY_PERIOD: usize = 7;

/// Trend component of an additive seasonal decomposition: the centered moving
/// average over one `period` (a `2×period` average for even periods).
///
/// The first and last `period / 2` positions have no trend. The series must span
/// two full periods and must not contain NaN.
///
/// ```
/// use madrid_air_quality::seasonal_trend;
///
/// let values: Vec<f64> = (0..14).map(|i| i as f64).collect();
/// let trend = seasonal_trend(&values, 7).unwrap();
/// assert_eq!(trend[2], None);
/// assert!((trend[3].unwrap() - 3.0).abs() < 1e-12);
/// ```
pub fn seasonal_trend(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, ModelError> {
    let needed = 2 * period.max(1);
    if values.len() < needed {
        return Err(ModelError::NotEnoughData {
            needed,
            found: values.len(),
        });
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(ModelError::MissingValues);
    }

    let weights: Vec<f64> = if period % 2 == 1 {
        vec![1.0 / period as f64; period]
    } else {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] /= 2.0;
        w[period] /= 2.0;
        w
    };
    let half = weights.len() / 2;

    Ok((0..values.len())
        .map(|i| {
            if i < half || i + half >= values.len() {
                return None;
            }
            let window = &values[i - half..=i + half];
            Some(window.iter().zip(&weights).map(|(v, w)| v * w).sum())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_pattern_is_removed_from_trend() -> Result<(), ModelError> {
        let pattern = [5.0, -1.0, 0.0, 2.0, -3.0, -2.0, -1.0];
        let values: Vec<f64> = (0..28).map(|i| 10.0 + pattern[i % 7]).collect();
        let trend = seasonal_trend(&values, WEEKLY_PERIOD)?;
        assert_eq!(trend.iter().filter(|t| t.is_none()).count(), 6);
        for value in trend.iter().flatten() {
            assert!((value - 10.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_even_period_uses_centered_weights() -> Result<(), ModelError> {
        let values = [1.0, 2.0, 3.0, 4.0];
        let trend = seasonal_trend(&values, 2)?;
        assert_eq!(trend, vec![None, Some(2.0), Some(3.0), None]);
        Ok(())
    }

    #[test]
    fn test_short_or_missing_series() {
        assert!(matches!(
            seasonal_trend(&[1.0; 13], WEEKLY_PERIOD),
            Err(ModelError::NotEnoughData { needed: 14, found: 13 })
        ));
        let mut values = vec![1.0; 14];
        values[3] = f64::NAN;
        assert!(matches!(
            seasonal_trend(&values, WEEKLY_PERIOD),
            Err(ModelError::MissingValues)
        ));
    }
}
