use crate::frame::{filter_by_label, TIME_COLUMN};
use crate::geo::nearby::TrafficLocations;
use crate::geo::weighting::{empty_traffic_aggregate, weight_nearby_traffic};
use crate::matching::error::MatchingError;
use crate::matching::{join_on_time, prepare_frame, sort_by_location_and_time, MatchingConfig};
use crate::stations::locations::air_stations_from_frame;
use bon::builder;
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::HashSet;

/// Matches air-quality readings with weather and nearby traffic.
///
/// Weather is joined on exact `time` equality. When `traffic`, `traffic_locations` and
/// `air_locations` are all supplied, each air station's slice is joined with the
/// distance-weighted aggregate of the traffic stations around it (see
/// [`weight_nearby_traffic`](crate::weight_nearby_traffic)) and the slices are
/// concatenated. Stations without any traffic station in range contribute no rows.
///
/// Soft conditions are logged and degrade gracefully:
/// * traffic without both location tables is ignored;
/// * with neither weather nor usable traffic, the input is returned unmatched.
///
/// The result is sorted by location and time.
///
/// # Errors
///
/// [`MatchingError::Frame`] when a frame lacks a required column (`time`, the
/// location column, or the traffic and location columns when traffic is used).
///
/// # Example
///
/// ```
/// use madrid_air_quality::{datetime_column, match_data};
/// use chrono::NaiveDate;
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let t = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let mut aq = df!("estacion" => ["Retiro"], "no2" => [21.0])?;
/// aq.with_column(datetime_column("time", &[t])?)?;
/// let mut weather = df!("temperature" => [11.5])?;
/// weather.with_column(datetime_column("time", &[t])?)?;
///
/// let matched = match_data(&aq).weather(&weather).call()?;
/// assert_eq!(matched.height(), 1);
/// # Ok(())
/// # }
/// ```
#[builder]
pub fn match_data(
    #[builder(start_fn)] air_quality: &DataFrame,
    weather: Option<&DataFrame>,
    traffic: Option<&DataFrame>,
    traffic_locations: Option<&DataFrame>,
    air_locations: Option<&DataFrame>,
    #[builder(default)] config: MatchingConfig,
) -> Result<DataFrame, MatchingError> {
    let location_by = config.location_by.as_str();
    let mut matched = prepare_frame(air_quality, &[TIME_COLUMN, location_by])?;

    let traffic_inputs = match (traffic, traffic_locations, air_locations) {
        (Some(traffic), Some(traffic_locations), Some(air_locations)) => {
            Some((traffic, traffic_locations, air_locations))
        }
        (Some(_), _, _) => {
            warn!("No traffic or air stations locations provided. Traffic data will not be used.");
            None
        }
        _ => None,
    };

    if weather.is_none() && traffic_inputs.is_none() {
        warn!("No weather or traffic data provided. Nothing to match.");
        return Ok(matched);
    }

    if let Some(weather) = weather {
        matched = join_on_time(&matched, weather)?;
        debug!("{} rows left after joining weather", matched.height());
    }

    if let Some((traffic, traffic_locations, air_locations)) = traffic_inputs {
        matched = join_nearby_traffic(
            &matched,
            traffic,
            traffic_locations,
            air_locations,
            &config,
        )?;
    }

    Ok(sort_by_location_and_time(&matched, location_by)?)
}

fn join_nearby_traffic(
    matched: &DataFrame,
    traffic: &DataFrame,
    traffic_locations: &DataFrame,
    air_locations: &DataFrame,
    config: &MatchingConfig,
) -> Result<DataFrame, MatchingError> {
    let location_by = config.location_by.as_str();
    let traffic = prepare_frame(traffic, &[TIME_COLUMN, "cod_cent", "intensidad", "carga"])?;
    let locations = TrafficLocations::from_frame(traffic_locations)?;
    let air_stations = air_stations_from_frame(air_locations, location_by)?;
    info!(
        "Weighting traffic of {} traffic stations around {} air stations",
        locations.len(),
        air_stations.len()
    );

    let mut seen = HashSet::new();
    let mut slices: Vec<DataFrame> = Vec::new();
    for station in air_stations {
        if !seen.insert(station.name.clone()) {
            continue;
        }
        let slice = filter_by_label(matched, location_by, |value| value == station.name)?;
        if slice.height() == 0 {
            continue;
        }
        let aggregate =
            weight_nearby_traffic(station.position, &traffic, &locations, &config.weighting)?;
        if aggregate.height() == 0 {
            debug!("No traffic stations near {}, skipping", station.name);
            continue;
        }
        slices.push(join_on_time(&slice, &aggregate)?);
    }

    let mut slices = slices.into_iter();
    let Some(mut combined) = slices.next() else {
        warn!("No air station has traffic stations nearby. Result is empty.");
        return Ok(join_on_time(&matched.clear(), &empty_traffic_aggregate()?)?);
    };
    for slice in slices {
        combined.vstack_mut(&slice)?;
    }
    combined.align_chunks();
    Ok(combined)
}
