use crate::frame::{f64_values, is_numeric, FrameError, TIME_COLUMN};
use polars::prelude::*;

/// Forward-limited linear interpolation over equally spaced samples.
///
/// Inside a gap, at most `limit` missing values are filled (the ones right after the
/// last known value), on the straight line between the two known neighbours. Values
/// after the last known sample carry that sample forward, again at most `limit` of
/// them. Missing values before the first known sample stay missing.
///
/// ```
/// use madrid_air_quality::interpolate_limited;
///
/// let filled = interpolate_limited(&[Some(0.0), None, None, Some(3.0)], 6);
/// assert_eq!(filled, vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0)]);
/// ```
pub fn interpolate_limited(values: &[Option<f64>], limit: usize) -> Vec<Option<f64>> {
    let is_known = |v: &Option<f64>| v.is_some_and(|x| !x.is_nan());
    let mut out: Vec<Option<f64>> = values
        .iter()
        .map(|v| if is_known(v) { *v } else { None })
        .collect();

    let mut previous: Option<(usize, f64)> = None;
    for i in 0..values.len() {
        let Some(value) = out[i] else {
            continue;
        };
        if let Some((start, start_value)) = previous {
            let span = (i - start) as f64;
            for (offset, slot) in out[start + 1..i].iter_mut().enumerate().take(limit) {
                let step = (offset + 1) as f64;
                *slot = Some(start_value + (value - start_value) * step / span);
            }
        }
        previous = Some((i, value));
    }

    if let Some((last, last_value)) = previous {
        for slot in out[last + 1..].iter_mut().take(limit) {
            *slot = Some(last_value);
        }
    }
    out
}

/// Applies [`interpolate_limited`] to every numeric column except `time`, in row order.
/// Interpolated columns become `Float64`.
pub(crate) fn interpolate_numeric_columns(
    df: &DataFrame,
    limit: usize,
) -> Result<DataFrame, FrameError> {
    let numeric: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|column| column.name().as_str() != TIME_COLUMN && is_numeric(column.dtype()))
        .map(|column| column.name().to_string())
        .collect();

    let mut out = df.clone();
    for name in numeric {
        let filled = interpolate_limited(&f64_values(df, &name)?, limit);
        out.with_column(Series::new(name.as_str().into(), filled))?;
    }
    Ok(out)
}
