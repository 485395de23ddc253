use haversine::{distance, Location as HaversineLocation, Units};
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use madrid_air_quality::LatLon;
///
/// let puerta_del_sol = LatLon(40.4168, -3.7038);
/// assert_eq!(puerta_del_sol.0, 40.4168); // Latitude
/// assert_eq!(puerta_del_sol.1, -3.7038); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }

    fn as_haversine(&self) -> HaversineLocation {
        HaversineLocation {
            latitude: self.0,
            longitude: self.1,
        }
    }
}

/// Great-circle distance in kilometres between two points (haversine formula,
/// Earth radius 6371 km).
pub fn haversine_km(from: LatLon, to: LatLon) -> f64 {
    distance(from.as_haversine(), to.as_haversine(), Units::Kilometers)
}
