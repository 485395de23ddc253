use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20[0-2][0-9]").expect("valid regex"));

/// First year between 2000 and 2029 appearing in `filename`.
///
/// ```
/// use madrid_air_quality::year_from_filename;
///
/// assert_eq!(year_from_filename("pmed_ubicacion_06-2017"), Some(2017));
/// assert_eq!(year_from_filename("ubicaciones.csv"), None);
/// ```
pub fn year_from_filename(filename: &str) -> Option<i32> {
    YEAR_RE
        .find(filename)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        assert_eq!(year_from_filename("pmed_ubicacion_04-2019.csv"), Some(2019));
        assert_eq!(year_from_filename("2018_to_2021.xlsx"), Some(2018));
    }

    #[test]
    fn test_out_of_range_years_are_ignored() {
        assert_eq!(year_from_filename("ubicaciones_1999.dbf"), None);
        assert_eq!(year_from_filename("pmed_2035.csv"), None);
        assert_eq!(year_from_filename(""), None);
    }
}
