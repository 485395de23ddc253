use crate::frame::{filter_by_label, unique_strings, TIME_COLUMN};
use crate::matching::error::MatchingError;
use crate::matching::{fill_location_gaps, join_sources, prepare_frame, MatchingConfig};
use bon::builder;
use log::debug;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Splits air-quality readings per station and matches each station on its own.
///
/// For every distinct value of the location column, the station's rows are sorted by
/// time, columns without any value are dropped, and gaps of at most
/// `config.interpolation_limit` samples in numeric columns are interpolated. The
/// result is then inner-joined on `time` with `weather` and `traffic` (both joined as
/// given, one row per timestamp expected), so every output timestamp is present in
/// all joined sources.
#[builder]
pub fn match_data_by_station(
    #[builder(start_fn)] air_quality: &DataFrame,
    weather: Option<&DataFrame>,
    traffic: Option<&DataFrame>,
    #[builder(default)] config: MatchingConfig,
) -> Result<BTreeMap<String, DataFrame>, MatchingError> {
    let location_by = config.location_by.as_str();
    let air_quality = prepare_frame(air_quality, &[TIME_COLUMN, location_by])?;
    let weather = weather.map(|w| prepare_frame(w, &[TIME_COLUMN])).transpose()?;
    let traffic = traffic.map(|t| prepare_frame(t, &[TIME_COLUMN])).transpose()?;

    let mut matched = BTreeMap::new();
    for station in unique_strings(&air_quality, location_by)? {
        let rows = filter_by_label(&air_quality, location_by, |value| value == station)?;
        let filled = fill_location_gaps(&rows, &config)?;
        let station_frame = join_sources(filled, weather.as_ref(), traffic.as_ref())?;
        debug!("Matched {} rows for station {station}", station_frame.height());
        matched.insert(station, station_frame);
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testing::{hour, hours, with_time};
    use crate::frame::{column_names, f64_values, millis_values, FrameError};
    use std::collections::HashSet;

    #[test]
    fn test_each_station_gets_its_own_frame() -> Result<(), Box<dyn std::error::Error>> {
        let times = hours(3);
        let aq = with_time(
            df!(
                "estacion" => ["A", "B", "A", "B", "A", "B"],
                "no2" => [Some(1.0), Some(10.0), None, Some(20.0), Some(3.0), Some(30.0)],
                "o3" => [None::<f64>, Some(5.0), None, Some(6.0), None, Some(7.0)],
            )?,
            &[times[0], times[0], times[1], times[1], times[2], times[2]],
        );
        let weather = with_time(df!("temperature" => [10.0, 11.0, 12.0])?, &times);

        let matched = match_data_by_station(&aq).weather(&weather).call()?;
        assert_eq!(matched.keys().collect::<Vec<_>>(), vec!["A", "B"]);

        let a = &matched["A"];
        assert_eq!(a.height(), 3);
        // o3 is empty for A and dropped; the no2 gap is interpolated.
        assert!(!column_names(a).contains(&"o3".to_string()));
        assert_eq!(f64_values(a, "no2")?, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(
            f64_values(a, "temperature")?,
            vec![Some(10.0), Some(11.0), Some(12.0)]
        );
        assert!(column_names(&matched["B"]).contains(&"o3".to_string()));
        Ok(())
    }

    #[test]
    fn test_output_times_within_intersection() -> Result<(), Box<dyn std::error::Error>> {
        let aq_times = [hour(1, 0), hour(1, 1), hour(1, 2), hour(1, 3)];
        let weather_times = [hour(1, 1), hour(1, 2), hour(1, 3), hour(1, 4)];
        let traffic_times = [hour(1, 0), hour(1, 2), hour(1, 3)];

        let aq = with_time(
            df!("estacion" => ["A"; 4], "no2" => [1.0, 2.0, 3.0, 4.0])?,
            &aq_times,
        );
        let weather = with_time(df!("temperature" => [1.0, 2.0, 3.0, 4.0])?, &weather_times);
        let traffic = with_time(
            df!("traffic_intensity" => [5.0, 6.0, 7.0], "traffic_load" => [1.0, 2.0, 3.0])?,
            &traffic_times,
        );

        let matched = match_data_by_station(&aq)
            .weather(&weather)
            .traffic(&traffic)
            .call()?;
        let out: HashSet<i64> = millis_values(&matched["A"], TIME_COLUMN)?
            .into_iter()
            .flatten()
            .collect();

        let millis = |ts: &[chrono::NaiveDateTime]| -> HashSet<i64> {
            ts.iter().map(|t| t.and_utc().timestamp_millis()).collect()
        };
        let intersection: HashSet<i64> = millis(&aq_times)
            .intersection(&millis(&weather_times))
            .copied()
            .collect::<HashSet<_>>()
            .intersection(&millis(&traffic_times))
            .copied()
            .collect();
        assert!(out.is_subset(&intersection));
        assert_eq!(out.len(), 2);
        Ok(())
    }

    #[test]
    fn test_micro_sign_is_replaced() -> Result<(), Box<dyn std::error::Error>> {
        let aq = with_time(df!("estacion" => ["A"], "no2 (µg/m3)" => [1.0])?, &hours(1));
        let matched = match_data_by_station(&aq).call()?;
        assert!(column_names(&matched["A"]).contains(&"no2 (ug/m3)".to_string()));
        Ok(())
    }

    #[test]
    fn test_weather_without_time_fails() -> Result<(), Box<dyn std::error::Error>> {
        let aq = with_time(df!("estacion" => ["A"], "no2" => [1.0])?, &hours(1));
        let weather = df!("temperature" => [1.0])?;
        let result = match_data_by_station(&aq).weather(&weather).call();
        assert!(matches!(
            result,
            Err(MatchingError::Frame(FrameError::MissingColumn(_)))
        ));
        Ok(())
    }
}
