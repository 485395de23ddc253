use crate::frame::{filter_by_label, unique_strings, TIME_COLUMN};
use crate::matching::error::MatchingError;
use crate::matching::{
    fill_location_gaps, join_sources, prepare_frame, sort_by_location_and_time, MatchingConfig,
};
use crate::stations::zones::ZoneTable;
use bon::builder;
use log::debug;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Groups air-quality readings by zone and matches each zone on its own.
///
/// Member stations are gap-filled individually (as in
/// [`match_data_by_station`](crate::match_data_by_station)) before their rows are
/// stacked into the zone frame, which is then inner-joined on `time` with `weather`
/// and `traffic`. Each zone frame is sorted by location and time. Zones without
/// readings are left out. `zones` defaults to
/// [`ZoneTable::madrid`].
#[builder]
pub fn match_data_by_zone(
    #[builder(start_fn)] air_quality: &DataFrame,
    weather: Option<&DataFrame>,
    traffic: Option<&DataFrame>,
    zones: Option<&ZoneTable>,
    #[builder(default)] config: MatchingConfig,
) -> Result<BTreeMap<String, DataFrame>, MatchingError> {
    let zones = zones.unwrap_or_else(|| ZoneTable::madrid());
    let location_by = config.location_by.as_str();
    let air_quality = prepare_frame(air_quality, &[TIME_COLUMN, location_by])?;
    let weather = weather.map(|w| prepare_frame(w, &[TIME_COLUMN])).transpose()?;
    let traffic = traffic.map(|t| prepare_frame(t, &[TIME_COLUMN])).transpose()?;

    let mut matched = BTreeMap::new();
    for zone in zones.zones() {
        let rows = filter_by_label(&air_quality, location_by, |value| {
            zone.stations.iter().any(|s| s == value)
        })?;
        if rows.height() == 0 {
            debug!("No readings for zone {}", zone.name);
            continue;
        }

        let mut zone_frame: Option<DataFrame> = None;
        for station in unique_strings(&rows, location_by)? {
            let station_rows = filter_by_label(&rows, location_by, |value| value == station)?;
            let filled = fill_location_gaps(&station_rows, &config)?;
            zone_frame = Some(match zone_frame {
                None => filled,
                Some(stacked) => stack_diagonal(stacked, filled)?,
            });
        }
        let Some(zone_frame) = zone_frame else {
            continue;
        };
        let zone_frame = join_sources(zone_frame, weather.as_ref(), traffic.as_ref())?;
        let zone_frame = sort_by_location_and_time(&zone_frame, location_by)?;
        matched.insert(zone.name.clone(), zone_frame);
    }
    Ok(matched)
}

/// Stacks frames whose column sets may differ, filling absent columns with nulls.
fn stack_diagonal(top: DataFrame, bottom: DataFrame) -> Result<DataFrame, PolarsError> {
    concat(
        [top.lazy(), bottom.lazy()],
        UnionArgs {
            to_supertypes: true,
            diagonal: true,
            ..Default::default()
        },
    )?
    .collect()
}
