//! Spatial index over traffic measurement stations.
//!
//! Stations are bulk-loaded into an R-tree keyed on `[latitude, longitude]`. A
//! radius query first collects the candidates inside a degree-space envelope that
//! is guaranteed to contain the search circle, then keeps the ones whose haversine
//! distance is within the radius.

use crate::frame::{f64_values, require_columns, string_values, FrameError};
use crate::geo::distance::{haversine_km, LatLon};
use ordered_float::OrderedFloat;
use polars::prelude::DataFrame;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Kilometres per degree of latitude (lower bound, at the equator).
const KM_PER_DEGREE_LAT: f64 = 110.574;
/// Kilometres per degree of longitude at the equator.
const KM_PER_DEGREE_LON: f64 = 111.320;
/// Extra room around the envelope so rounding never drops a station on the radius.
const ENVELOPE_MARGIN: f64 = 1.1;

/// A traffic station with a resolved coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedStation {
    /// Station code (`cod_cent`).
    pub code: String,
    pub position: LatLon,
}

/// Implementation required by `rstar` to treat a station as a point in the R-tree.
impl RTreeObject for LocatedStation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.0, self.position.1])
    }
}

/// Squared Euclidean distance in degree space. Only used by the tree for ordering;
/// reported distances are always haversine.
impl PointDistance for LocatedStation {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position.0 - point[0];
        let dy = self.position.1 - point[1];
        dx * dx + dy * dy
    }
}

/// A station found by [`TrafficLocations::within`] with its distance to the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyStation<'a> {
    pub station: &'a LocatedStation,
    pub distance_km: f64,
}

#[derive(Debug, Clone)]
pub struct TrafficLocations {
    rtree: RTree<LocatedStation>,
}

impl TrafficLocations {
    pub fn new(stations: Vec<LocatedStation>) -> Self {
        Self {
            rtree: RTree::bulk_load(stations),
        }
    }

    /// Builds the index from a traffic-locations frame with `cod_cent`, `latitud`
    /// and `longitud` columns. Rows without a code or a full coordinate pair are skipped.
    pub fn from_frame(df: &DataFrame) -> Result<Self, FrameError> {
        require_columns(df, &["cod_cent", "latitud", "longitud"])?;
        let codes = string_values(df, "cod_cent")?;
        let latitudes = f64_values(df, "latitud")?;
        let longitudes = f64_values(df, "longitud")?;

        let stations: Vec<LocatedStation> = codes
            .into_iter()
            .zip(latitudes)
            .zip(longitudes)
            .filter_map(|((code, lat), lon)| match (code, lat, lon) {
                (Some(code), Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                    Some(LocatedStation {
                        code,
                        position: LatLon(lat, lon),
                    })
                }
                _ => None,
            })
            .collect();

        let skipped = df.height() - stations.len();
        if skipped > 0 {
            log::debug!("Skipped {skipped} traffic locations without code or coordinates");
        }
        Ok(Self::new(stations))
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    /// All stations within `radius_km` of `center`, closest first.
    pub fn within(&self, center: LatLon, radius_km: f64) -> Vec<NearbyStation<'_>> {
        if radius_km < 0.0 || !radius_km.is_finite() {
            return vec![];
        }
        let d_lat = radius_km / KM_PER_DEGREE_LAT * ENVELOPE_MARGIN;
        let cos_lat = center.0.to_radians().cos().abs().max(1e-6);
        let d_lon = radius_km / (KM_PER_DEGREE_LON * cos_lat) * ENVELOPE_MARGIN;
        let envelope = AABB::from_corners(
            [center.0 - d_lat, center.1 - d_lon],
            [center.0 + d_lat, center.1 + d_lon],
        );

        let mut nearby: Vec<NearbyStation<'_>> = self
            .rtree
            .locate_in_envelope(&envelope)
            .filter_map(|station| {
                let distance_km = haversine_km(center, station.position);
                (distance_km <= radius_km).then_some(NearbyStation {
                    station,
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by_key(|candidate| OrderedFloat(candidate.distance_km));
        nearby
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    const CENTER: LatLon = LatLon(40.4168, -3.7038);
    /// Degrees of latitude per kilometre on a 6371 km sphere.
    const DEG_PER_KM: f64 = 1.0 / 111.194_926_6;

    fn station(code: &str, north_km: f64, east_km: f64) -> LocatedStation {
        let lat = CENTER.0 + north_km * DEG_PER_KM;
        let lon = CENTER.1 + east_km * DEG_PER_KM / CENTER.0.to_radians().cos();
        LocatedStation {
            code: code.to_string(),
            position: LatLon(lat, lon),
        }
    }

    #[test]
    fn test_within_keeps_only_stations_in_radius_sorted() {
        let locations = TrafficLocations::new(vec![
            station("far", 2.0, 0.0),
            station("east", 0.0, 0.5),
            station("near", 0.3, 0.0),
            station("edge", 0.0, -0.74),
        ]);
        let found = locations.within(CENTER, 0.75);
        let codes: Vec<&str> = found.iter().map(|n| n.station.code.as_str()).collect();
        assert_eq!(codes, vec!["near", "east", "edge"]);
        assert!((found[0].distance_km - 0.3).abs() < 1e-3);
    }

    #[test]
    fn test_within_empty_index() {
        let locations = TrafficLocations::new(vec![]);
        assert!(locations.is_empty());
        assert!(locations.within(CENTER, 0.75).is_empty());
    }

    #[test]
    fn test_from_frame_skips_rows_without_coordinates() -> Result<(), Box<dyn std::error::Error>>
    {
        let df = df!(
            "cod_cent" => [Some("01001"), Some("01002"), None],
            "latitud" => [Some(40.41), None, Some(40.42)],
            "longitud" => [Some(-3.70), Some(-3.71), Some(-3.72)],
        )?;
        let locations = TrafficLocations::from_frame(&df)?;
        assert_eq!(locations.len(), 1);
        Ok(())
    }

    #[test]
    fn test_from_frame_requires_columns() -> Result<(), Box<dyn std::error::Error>> {
        let df = df!("cod_cent" => ["01001"], "latitud" => [40.41])?;
        assert!(matches!(
            TrafficLocations::from_frame(&df),
            Err(FrameError::MissingColumn(ref c)) if c == "longitud"
        ));
        Ok(())
    }
}
