//! Fuzzy reconciliation of station names.
//!
//! Air-quality exports and the station-location table spell station names
//! differently (`Pza. de España` vs `Plaza de España`). Names are aligned with a
//! Ratcliff/Obershelp (gestalt pattern matching) similarity ratio.

use crate::frame::{string_values, FrameError};
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::collections::HashMap;

pub const DEFAULT_CUTOFF: f64 = 0.6;
pub const DEFAULT_MAX_MATCHES: usize = 3;

/// `Retiro` is spelled too differently from its location entry to be matched.
const RETIRO: (&str, &str) = ("Retiro", "Parque del Retiro");

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let mut lengths = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        let mut next = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = lengths[j - blo] + 1;
                next[j - blo + 1] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        lengths = next;
    }
    (best_i, best_j, best_k)
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = vec![((0, a.len()), (0, b.len()))];
    while let Some(((alo, ahi), (blo, bhi))) = queue.pop() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            queue.push(((i + k, ahi), (j + k, bhi)));
        }
    }
    total
}

/// Similarity in `[0, 1]`: `2 * M / (len(a) + len(b))` where `M` counts characters
/// in matching blocks. Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let length = a.len() + b.len();
    if length == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / length as f64
}

/// Up to `max_matches` candidates whose ratio to `word` is at least `cutoff`, best first.
///
/// ```
/// use madrid_air_quality::close_matches;
///
/// let candidates = ["Plaza de España", "Escuelas Aguirre"];
/// assert_eq!(close_matches("Pza. de España", candidates, 3, 0.6), vec!["Plaza de España"]);
/// ```
pub fn close_matches<'a, I>(word: &str, candidates: I, max_matches: usize, cutoff: f64) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .map(|candidate| (similarity_ratio(candidate, word), candidate))
        .filter(|(score, _)| *score >= cutoff)
        .collect();
    scored.sort_by(|x, y| (OrderedFloat(y.0), y.1).cmp(&(OrderedFloat(x.0), x.1)));
    scored
        .into_iter()
        .take(max_matches)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

/// Renames to apply to `names` so they match entries of `reference`.
///
/// Names already present in `reference` (or without a close match) are left out.
/// `Retiro` always maps to `Parque del Retiro` unless a closer match was found.
pub fn reconcile_station_names<S, R>(names: &[S], reference: &[R]) -> HashMap<String, String>
where
    S: AsRef<str>,
    R: AsRef<str>,
{
    let mut renames: HashMap<String, String> = names
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let best = close_matches(
                name,
                reference.iter().map(AsRef::as_ref),
                DEFAULT_MAX_MATCHES,
                DEFAULT_CUTOFF,
            )
            .into_iter()
            .next()?;
            (best != name).then(|| (name.to_string(), best))
        })
        .collect();
    renames
        .entry(RETIRO.0.to_string())
        .or_insert_with(|| RETIRO.1.to_string());
    renames
}

/// Replaces values of `column` found in `renames`; other values are kept.
pub fn rename_values(
    df: &DataFrame,
    column: &str,
    renames: &HashMap<String, String>,
) -> Result<DataFrame, FrameError> {
    let renamed: Vec<Option<String>> = string_values(df, column)?
        .into_iter()
        .map(|value| value.map(|v| renames.get(&v).cloned().unwrap_or(v)))
        .collect();
    let mut out = df.clone();
    out.with_column(Series::new(column.into(), renamed))?;
    Ok(out)
}
