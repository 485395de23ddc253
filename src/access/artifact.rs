use std::fmt;

/// Extensions of cached frames, in lookup order.
pub const CACHE_EXTENSIONS: &[&str] = &["feather", "parquet"];
const CSV_EXTENSION: &[&str] = &["csv"];

/// Cached datasets found under a data root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    AirQuality,
    /// Air quality with the meteorological influence removed.
    AirQualityNormalized,
    Weather,
    Traffic,
    TrafficLocations,
    /// Traffic locations as extracted, before cleaning.
    TrafficLocationsRaw,
    /// Official air-station table (semicolon CSV).
    AirLocations,
    MadridData,
    MadridDataNormalized,
}

impl Artifact {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Artifact::AirQuality => "air_quality_data",
            Artifact::AirQualityNormalized => "aq-weather_normalized",
            Artifact::Weather => "weather_data",
            Artifact::Traffic => "traffic_data",
            Artifact::TrafficLocations => "traffic_locations_data",
            Artifact::TrafficLocationsRaw => "pmed_trafico_ubicaciones_raw",
            Artifact::AirLocations => "informacion_estaciones_red_calidad_aire",
            Artifact::MadridData => "madrid_data",
            Artifact::MadridDataNormalized => "madrid_normalized_data",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Artifact::AirLocations => CSV_EXTENSION,
            _ => CACHE_EXTENSIONS,
        }
    }

    /// Whether the artifact is a frame cache that [`save_artifact`](crate::DataAccess::save_artifact) can write.
    pub fn is_cache(&self) -> bool {
        self.extensions() == CACHE_EXTENSIONS
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.file_stem(), self.extensions().join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(Artifact::Weather.to_string(), "weather_data.feather|parquet");
        assert_eq!(
            Artifact::AirLocations.to_string(),
            "informacion_estaciones_red_calidad_aire.csv"
        );
        assert!(Artifact::MadridData.is_cache());
        assert!(!Artifact::AirLocations.is_cache());
    }
}
