//! This module provides the main entry point of the crate: a client bound to a data
//! directory that loads the cached Madrid datasets and matches them.

use crate::access::artifact::Artifact;
use crate::access::cache::InvalidationPolicy;
use crate::access::DataAccess;
use crate::error::MadridError;
use crate::extraction::archive::ExtractionConfig;
use crate::matching::by_station::match_data_by_station;
use crate::matching::by_zone::match_data_by_zone;
use crate::matching::global::match_data;
use crate::matching::MatchingConfig;
use crate::stations::zones::ZoneTable;
use crate::utils::{ensure_data_dir_exists, get_data_dir};
use bon::bon;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The main client for the Madrid air-quality, weather and traffic datasets.
///
/// A client is bound to a data directory, which is searched recursively for the
/// cached datasets (`air_quality_data.feather`, `weather_data.parquet`, ...). Loaded
/// frames are kept in memory and reloaded when their file changes (see
/// [`InvalidationPolicy`]).
///
/// Create an instance using [`MadridData::new()`] for the default data directory or
/// [`MadridData::with_data_dir()`] for a custom one. [`MadridData::configured()`]
/// exposes every option.
///
/// # Examples
///
/// ```no_run
/// # use madrid_air_quality::{MadridData, MadridError};
/// # fn run() -> Result<(), MadridError> {
/// let client = MadridData::new()?;
/// let air_quality = client.air_quality(false)?;
/// let weather = client.weather()?;
/// let matched = client.match_data(&air_quality).weather(&weather).call()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MadridData {
    data_dir: PathBuf,
    access: DataAccess,
    matching: MatchingConfig,
}

#[bon]
impl MadridData {
    /// Creates a client for the default data directory
    /// (e.g. `~/.local/share/madrid_air_quality` on Linux), creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MadridError::DataDirResolution`] if the platform data directory is
    /// unknown and [`MadridError::DataDirCreation`] if it cannot be created.
    pub fn new() -> Result<Self, MadridError> {
        let data_dir = get_data_dir().map_err(MadridError::DataDirResolution)?;
        Self::with_data_dir(data_dir)
    }

    /// Creates a client for `data_dir` with default settings, creating the directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns [`MadridError::DataDirCreation`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self, MadridError> {
        Self::configured(data_dir).call()
    }

    /// Creates a client for `data_dir` with explicit settings.
    ///
    /// # Optional Builder Methods
    ///
    /// * `.matching(MatchingConfig)`: location column, interpolation limit and traffic
    ///   weighting used by every matching call.
    /// * `.policy(InvalidationPolicy)`: when cached frames are reloaded.
    /// * `.zones(ZoneTable)`: zone grouping of the air-quality stations.
    /// * `.extraction(ExtractionConfig)`: archives downloaded when no traffic-location
    ///   file exists.
    /// * `.download_locations(bool)`: set to `false` to never go to the network.
    ///
    /// # Example
    ///
    /// ```
    /// # use madrid_air_quality::{InvalidationPolicy, MadridData, MatchingConfig};
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let dir = std::env::temp_dir().join("madrid_air_quality_doc");
    /// let client = MadridData::configured(dir)
    ///     .matching(MatchingConfig::builder().interpolation_limit(3).build())
    ///     .policy(InvalidationPolicy::Never)
    ///     .download_locations(false)
    ///     .call()?;
    /// assert_eq!(client.matching().interpolation_limit, 3);
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn configured(
        #[builder(start_fn)] data_dir: PathBuf,
        #[builder(default)] matching: MatchingConfig,
        #[builder(default)] policy: InvalidationPolicy,
        #[builder(default)] zones: ZoneTable,
        #[builder(default)] extraction: ExtractionConfig,
        #[builder(default = true)] download_locations: bool,
    ) -> Result<Self, MadridError> {
        ensure_data_dir_exists(&data_dir)
            .map_err(|e| MadridError::DataDirCreation(data_dir.clone(), e))?;
        let access = DataAccess::builder()
            .policy(policy)
            .zones(zones)
            .matching(matching.clone())
            .extraction(extraction)
            .download_locations(download_locations)
            .build();
        Ok(Self {
            data_dir,
            access,
            matching,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn access(&self) -> &DataAccess {
        &self.access
    }

    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    /// Hourly air-quality readings; `normalized` selects the weather-normalized variant.
    pub fn air_quality(&self, normalized: bool) -> Result<DataFrame, MadridError> {
        Ok(self.access.air_quality(&self.data_dir, normalized)?)
    }

    pub fn weather(&self) -> Result<DataFrame, MadridError> {
        Ok(self.access.weather(&self.data_dir)?)
    }

    pub fn traffic(&self) -> Result<DataFrame, MadridError> {
        Ok(self.access.traffic(&self.data_dir)?)
    }

    /// Cleaned traffic-station locations, extracted from the published archives when no
    /// local copy exists.
    pub fn traffic_locations(&self) -> Result<DataFrame, MadridError> {
        Ok(self.access.traffic_locations(&self.data_dir)?)
    }

    pub fn air_locations(&self) -> Result<DataFrame, MadridError> {
        Ok(self.access.air_locations(&self.data_dir)?)
    }

    /// The matched dataset, built from the individual datasets when no cached copy
    /// exists (normalized data has no such fallback).
    pub fn madrid_data(&self, normalized: bool) -> Result<DataFrame, MadridError> {
        Ok(self.access.madrid_data(&self.data_dir, normalized)?)
    }

    /// Stores `df` as the given artifact in the data directory.
    pub fn save(&self, artifact: Artifact, df: &mut DataFrame) -> Result<PathBuf, MadridError> {
        Ok(self.access.save_artifact(&self.data_dir, artifact, df)?)
    }

    /// [`match_data`](crate::match_data) with this client's [`MatchingConfig`].
    #[builder]
    pub fn match_data(
        &self,
        #[builder(start_fn)] air_quality: &DataFrame,
        weather: Option<&DataFrame>,
        traffic: Option<&DataFrame>,
        traffic_locations: Option<&DataFrame>,
        air_locations: Option<&DataFrame>,
    ) -> Result<DataFrame, MadridError> {
        Ok(match_data(air_quality)
            .maybe_weather(weather)
            .maybe_traffic(traffic)
            .maybe_traffic_locations(traffic_locations)
            .maybe_air_locations(air_locations)
            .config(self.matching.clone())
            .call()?)
    }

    /// [`match_data_by_station`](crate::match_data_by_station) with this client's
    /// [`MatchingConfig`].
    #[builder]
    pub fn match_by_station(
        &self,
        #[builder(start_fn)] air_quality: &DataFrame,
        weather: Option<&DataFrame>,
        traffic: Option<&DataFrame>,
    ) -> Result<BTreeMap<String, DataFrame>, MadridError> {
        Ok(match_data_by_station(air_quality)
            .maybe_weather(weather)
            .maybe_traffic(traffic)
            .config(self.matching.clone())
            .call()?)
    }

    /// [`match_data_by_zone`](crate::match_data_by_zone) over this client's zone table.
    #[builder]
    pub fn match_by_zone(
        &self,
        #[builder(start_fn)] air_quality: &DataFrame,
        weather: Option<&DataFrame>,
        traffic: Option<&DataFrame>,
    ) -> Result<BTreeMap<String, DataFrame>, MadridError> {
        Ok(match_data_by_zone(air_quality)
            .maybe_weather(weather)
            .maybe_traffic(traffic)
            .zones(self.access.zones())
            .config(self.matching.clone())
            .call()?)
    }
}
