//! Loading of the cached Madrid datasets, with in-memory memoization.
//!
//! Every accessor takes a root path that is searched recursively for the artifact
//! (see [`locate_artifact`](locate::locate_artifact)); a path to the file itself
//! works too. Results are cached per artifact and root in a [`FrameCache`].

pub mod artifact;
pub mod cache;
pub mod error;
pub mod loader;
pub mod locate;

use crate::access::artifact::Artifact;
use crate::access::cache::{CacheKey, Clock, FrameCache, InvalidationPolicy, LoadedFrame};
use crate::access::error::AccessError;
use crate::access::loader::{air_locations_frame, prepare_traffic, read_frame, write_parquet};
use crate::access::locate::{find_artifact, locate_artifact};
use crate::extraction::archive::{ExtractionConfig, LocationExtractor};
use crate::extraction::cleaning::clean_traffic_locations_frame;
use crate::extraction::tabular::RawTable;
use crate::frame::unique_strings;
use crate::matching::global::match_data;
use crate::matching::MatchingConfig;
use crate::stations::similarity::{reconcile_station_names, rename_values};
use crate::stations::zones::ZoneTable;
use bon::bon;
use log::{info, warn};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub struct DataAccess {
    cache: FrameCache,
    zones: ZoneTable,
    matching: MatchingConfig,
    extraction: ExtractionConfig,
    download_locations: bool,
}

impl Default for DataAccess {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[bon]
impl DataAccess {
    /// # Arguments
    ///
    /// * `policy` - when cached frames are reloaded (default: on file modification).
    /// * `clock` - time source for [`InvalidationPolicy::MaxAge`].
    /// * `zones` - zone table for the `zone` column of air locations.
    /// * `matching` - configuration used when `madrid_data` has to be built.
    /// * `extraction` - archives downloaded when no traffic-location file exists.
    /// * `download_locations` - set to `false` to never go to the network.
    #[builder]
    pub fn new(
        #[builder(default)] policy: InvalidationPolicy,
        clock: Option<Arc<dyn Clock>>,
        #[builder(default)] zones: ZoneTable,
        #[builder(default)] matching: MatchingConfig,
        #[builder(default)] extraction: ExtractionConfig,
        #[builder(default = true)] download_locations: bool,
    ) -> Self {
        let cache = match clock {
            Some(clock) => FrameCache::with_clock(policy, clock),
            None => FrameCache::new(policy),
        };
        Self {
            cache,
            zones,
            matching,
            extraction,
            download_locations,
        }
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn zones(&self) -> &ZoneTable {
        &self.zones
    }

    fn cached_file(&self, root: &Path, artifact: Artifact) -> Result<DataFrame, AccessError> {
        self.cache.get_or_load(CacheKey::new(artifact, root), || {
            let path = locate_artifact(root, artifact)?;
            Ok(LoadedFrame::from_file(read_frame(&path)?, path))
        })
    }

    /// Hourly air-quality readings; `normalized` selects the weather-normalized variant.
    pub fn air_quality(&self, root: &Path, normalized: bool) -> Result<DataFrame, AccessError> {
        let artifact = if normalized {
            Artifact::AirQualityNormalized
        } else {
            Artifact::AirQuality
        };
        self.cached_file(root, artifact)
    }

    pub fn weather(&self, root: &Path) -> Result<DataFrame, AccessError> {
        self.cached_file(root, Artifact::Weather)
    }

    /// Traffic readings, cleaned by [`prepare_traffic`].
    pub fn traffic(&self, root: &Path) -> Result<DataFrame, AccessError> {
        self.cache
            .get_or_load(CacheKey::new(Artifact::Traffic, root), || {
                let path = locate_artifact(root, Artifact::Traffic)?;
                let traffic = prepare_traffic(&read_frame(&path)?)?;
                Ok(LoadedFrame::from_file(traffic, path))
            })
    }

    /// Cleaned traffic-station locations.
    ///
    /// Falls back, in order, to cleaning the raw locations artifact and to downloading
    /// and cleaning the configured archives. Downloaded tables are saved under `root`
    /// when it is a directory.
    pub fn traffic_locations(&self, root: &Path) -> Result<DataFrame, AccessError> {
        self.cache
            .get_or_load(CacheKey::new(Artifact::TrafficLocations, root), || {
                if let Some(path) = find_artifact(root, Artifact::TrafficLocations)? {
                    return Ok(LoadedFrame::from_file(read_frame(&path)?, path));
                }
                warn!("No cleaned traffic locations under {}", root.display());

                if let Some(path) = find_artifact(root, Artifact::TrafficLocationsRaw)? {
                    info!("Cleaning raw traffic locations from {}", path.display());
                    let cleaned = clean_traffic_locations_frame(&read_frame(&path)?)?;
                    return Ok(LoadedFrame::from_file(cleaned, path));
                }
                if !self.download_locations {
                    return Err(AccessError::ArtifactNotFound {
                        artifact: Artifact::TrafficLocations,
                        root: root.to_path_buf(),
                    });
                }
                warn!("No raw traffic locations either, downloading archives");

                let raw = LocationExtractor::new().extract(&self.extraction)?;
                let mut raw_frame = raw.to_frame()?;
                let mut cleaned = clean_traffic_locations_frame(&raw_frame)?;
                if root.is_dir() {
                    for (artifact, df) in [
                        (Artifact::TrafficLocationsRaw, &mut raw_frame),
                        (Artifact::TrafficLocations, &mut cleaned),
                    ] {
                        if let Err(e) = self.write_artifact(root, artifact, df) {
                            warn!("Could not save extracted {artifact}: {e}");
                        }
                    }
                }
                Ok(LoadedFrame::built(cleaned))
            })
    }

    /// Official air-station table with `codigo_corto, estacion, latitud, longitud, zone`.
    pub fn air_locations(&self, root: &Path) -> Result<DataFrame, AccessError> {
        self.cache
            .get_or_load(CacheKey::new(Artifact::AirLocations, root), || {
                let path = locate_artifact(root, Artifact::AirLocations)?;
                let bytes =
                    std::fs::read(&path).map_err(|e| AccessError::FileOpen(path.clone(), e))?;
                let table = RawTable::from_latin1_csv(&bytes)
                    .map_err(|e| AccessError::AirLocationsRead(path.clone(), e))?;
                Ok(LoadedFrame::from_file(
                    air_locations_frame(&table, &self.zones)?,
                    path,
                ))
            })
    }

    /// The fully matched dataset.
    ///
    /// When the cached file is missing (and `normalized` is false) it is rebuilt from
    /// the individual artifacts: air-quality station names are reconciled with the
    /// air-station table, then everything goes through [`match_data`].
    pub fn madrid_data(&self, root: &Path, normalized: bool) -> Result<DataFrame, AccessError> {
        let artifact = if normalized {
            Artifact::MadridDataNormalized
        } else {
            Artifact::MadridData
        };
        self.cache.get_or_load(CacheKey::new(artifact, root), || {
            if let Some(path) = find_artifact(root, artifact)? {
                return Ok(LoadedFrame::from_file(read_frame(&path)?, path));
            }
            if normalized {
                return Err(AccessError::ArtifactNotFound {
                    artifact,
                    root: root.to_path_buf(),
                });
            }
            warn!(
                "No {artifact} under {}, matching the individual datasets",
                root.display()
            );
            Ok(LoadedFrame::built(self.build_madrid_data(root)?))
        })
    }

    fn build_madrid_data(&self, root: &Path) -> Result<DataFrame, AccessError> {
        let air_quality = self.air_quality(root, false)?;
        let weather = self.weather(root)?;
        let traffic = self.traffic(root)?;
        let traffic_locations = self.traffic_locations(root)?;
        let air_locations = self.air_locations(root)?;

        let location_by = self.matching.location_by.as_str();
        let renames = reconcile_station_names(
            &unique_strings(&air_quality, location_by)?,
            &unique_strings(&air_locations, location_by)?,
        );
        let air_quality = rename_values(&air_quality, location_by, &renames)?;

        Ok(match_data(&air_quality)
            .weather(&weather)
            .traffic(&traffic)
            .traffic_locations(&traffic_locations)
            .air_locations(&air_locations)
            .config(self.matching.clone())
            .call()?)
    }

    fn write_artifact(
        &self,
        root: &Path,
        artifact: Artifact,
        df: &mut DataFrame,
    ) -> Result<PathBuf, AccessError> {
        if !artifact.is_cache() {
            return Err(AccessError::NotACache(artifact));
        }
        std::fs::create_dir_all(root)
            .map_err(|e| AccessError::DataDirCreation(root.to_path_buf(), e))?;
        let path = root.join(format!("{}.parquet", artifact.file_stem()));
        write_parquet(df, &path)?;
        info!("Saved {} rows of {artifact} to {}", df.height(), path.display());
        Ok(path)
    }

    /// Writes `df` as `<root>/<artifact>.parquet` and drops cached copies of `artifact`.
    ///
    /// A feather file of the same artifact under `root` still takes precedence on load.
    pub fn save_artifact(
        &self,
        root: &Path,
        artifact: Artifact,
        df: &mut DataFrame,
    ) -> Result<PathBuf, AccessError> {
        let path = self.write_artifact(root, artifact, df)?;
        self.cache.invalidate(artifact);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testing::{hours, with_time};
    use crate::frame::{column_names, string_values, TIME_COLUMN};
    use polars::prelude::*;
    use std::fs;

    fn offline() -> DataAccess {
        DataAccess::builder().download_locations(false).build()
    }

    const AIR_LOCATIONS_CSV: &str = "CODIGO_CORTO;ESTACION;LATITUD;LONGITUD\n\
                                     8;Escuelas Aguirre;40,4215;-3,6823\n\
                                     35;Pza. del Carmen;40,4192;-3,7032\n";

    fn write_fixture(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let access = offline();
        let times = hours(2);
        let mut air_quality = with_time(
            df!(
                "estacion" => ["Escuelas Aguire", "Escuelas Aguire"],
                "no2 (µg/m3)" => [40.0, 42.0],
            )?,
            &times,
        );
        let mut weather = with_time(df!("temperature" => [12.0, 13.0])?, &times);
        let mut traffic = with_time(
            df!(
                "nombre" => ["P1", "P1"],
                "cod_cent" => ["01001", "01001"],
                "id" => [1i64, 1],
                "intensidad" => [300.0, 500.0],
                "carga" => [20.0, 40.0],
                "ocupacion" => [3.0, 5.0],
            )?,
            &times,
        );
        let mut locations = df!(
            "cod_cent" => ["01001"],
            "nombre" => ["P1"],
            "tipo_elem" => ["URB"],
            "latitud" => [40.4217],
            "longitud" => [-3.6825],
            "year" => [2021i32],
        )?;
        access.save_artifact(root, Artifact::AirQuality, &mut air_quality)?;
        access.save_artifact(root, Artifact::Weather, &mut weather)?;
        access.save_artifact(root, Artifact::Traffic, &mut traffic)?;
        access.save_artifact(root, Artifact::TrafficLocations, &mut locations)?;
        fs::write(
            root.join("informacion_estaciones_red_calidad_aire.csv"),
            AIR_LOCATIONS_CSV,
        )?;
        Ok(())
    }

    #[test]
    fn test_accessors_are_cached() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        write_fixture(dir.path())?;
        let access = offline();

        let weather = access.weather(dir.path())?;
        assert_eq!(weather.height(), 2);
        access.weather(dir.path())?;
        assert_eq!(access.cache().len(), 1);

        let traffic = access.traffic(dir.path())?;
        assert!(column_names(&traffic).contains(&TIME_COLUMN.to_string()));
        let air = access.air_locations(dir.path())?;
        assert_eq!(
            string_values(&air, "zone")?,
            vec![Some("Interior M-30".to_string()); 2]
        );
        assert_eq!(access.cache().len(), 3);
        Ok(())
    }

    #[test]
    fn test_traffic_with_fecha_column_is_loaded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let access = offline();
        let mut traffic = df!(
            "nombre" => ["P1", "P1", "P2"],
            "cod_cent" => ["01001", "01001", "01002"],
            "id" => [1i64, 1, 2],
            "intensidad" => [300.0, -1.0, 120.0],
            "carga" => [20.0, 0.0, 10.0],
            "ocupacion" => [3.0, 0.0, 1.0],
        )?;
        traffic.with_column(crate::frame::datetime_column("fecha", &hours(3))?)?;
        access.save_artifact(dir.path(), Artifact::Traffic, &mut traffic)?;

        let loaded = access.traffic(dir.path())?;
        assert_eq!(
            column_names(&loaded),
            crate::access::loader::TRAFFIC_COLUMNS.to_vec()
        );
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.column(TIME_COLUMN)?.null_count(), 0);
        Ok(())
    }

    #[test]
    fn test_missing_artifact_is_reported()-> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let access = offline();
        assert!(matches!(
            access.weather(dir.path()),
            Err(AccessError::ArtifactNotFound { artifact: Artifact::Weather, .. })
        ));
        assert!(matches!(
            access.traffic_locations(dir.path()),
            Err(AccessError::ArtifactNotFound { .. })
        ));
        assert!(matches!(
            access.madrid_data(dir.path(), true),
            Err(AccessError::ArtifactNotFound { .. })
        ));
        assert!(access.cache().is_empty());
        Ok(())
    }

    #[test]
    fn test_traffic_locations_fall_back_to_raw_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let access = offline();
        let mut raw = df!(
            "COD_CENT" => ["7", "7"],
            "LATITUD" => ["40,41", "40,42"],
            "LONGITUD" => ["-3,70", "-3,71"],
            "year" => ["2019", "2022"],
        )?;
        access.save_artifact(dir.path(), Artifact::TrafficLocationsRaw, &mut raw)?;

        let cleaned = access.traffic_locations(dir.path())?;
        assert_eq!(cleaned.height(), 1);
        assert_eq!(
            cleaned.column("year")?.cast(&DataType::Int64)?.i64()?.get(0),
            Some(2022)
        );
        Ok(())
    }

    #[test]
    fn test_madrid_data_is_built_when_missing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        write_fixture(dir.path())?;
        let access = offline();

        let matched = access.madrid_data(dir.path(), false)?;
        assert_eq!(matched.height(), 2);
        assert_eq!(
            string_values(&matched, "estacion")?,
            vec![Some("Escuelas Aguirre".to_string()); 2]
        );
        let columns = column_names(&matched);
        for expected in ["no2 (ug/m3)", "temperature", "traffic_intensity", "traffic_load"] {
            assert!(columns.contains(&expected.to_string()), "missing {expected}");
        }
        Ok(())
    }

    #[test]
    fn test_saving_invalidates_cached_copies() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let access = DataAccess::builder()
            .policy(InvalidationPolicy::Never)
            .download_locations(false)
            .build();
        let mut weather = with_time(df!("temperature" => [1.0])?, &hours(1));
        access.save_artifact(dir.path(), Artifact::Weather, &mut weather)?;
        assert_eq!(access.weather(dir.path())?.height(), 1);

        let mut weather = with_time(df!("temperature" => [1.0, 2.0])?, &hours(2));
        access.save_artifact(dir.path(), Artifact::Weather, &mut weather)?;
        assert_eq!(access.weather(dir.path())?.height(), 2);
        assert!(matches!(
            access.save_artifact(dir.path(), Artifact::AirLocations, &mut weather),
            Err(AccessError::NotACache(_))
        ));
        Ok(())
    }
}
