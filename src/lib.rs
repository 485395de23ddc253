mod access;
mod error;
mod extraction;
mod frame;
mod geo;
mod madrid;
mod matching;
mod modeling;
mod preprocessing;
mod stations;
mod utils;

pub use error::MadridError;
pub use madrid::MadridData;

pub use frame::{
    datetime_column, normalize_time, require_columns, sanitize_column_names, FrameError,
    TIME_COLUMN,
};

pub use geo::distance::{haversine_km, LatLon};
pub use geo::error::GeoError;
pub use geo::nearby::{LocatedStation, NearbyStation, TrafficLocations};
pub use geo::projection::utm30n_to_wgs84;
pub use geo::weighting::{
    proximity_weight, weight_nearby_traffic, WeightingConfig, TRAFFIC_INTENSITY, TRAFFIC_LOAD,
};

pub use stations::error::StationsError;
pub use stations::locations::{
    air_stations_from_frame, traffic_stations_to_frame, AirStation, TrafficStation,
};
pub use stations::similarity::{
    close_matches, reconcile_station_names, rename_values, similarity_ratio, DEFAULT_CUTOFF,
    DEFAULT_MAX_MATCHES,
};
pub use stations::tables::{
    abbreviation_of, indicator_by_code, indicators, parameter_of, station_codes, station_name,
    Indicator,
};
pub use stations::zones::{Zone, ZoneTable};

pub use matching::by_station::match_data_by_station;
pub use matching::by_zone::match_data_by_zone;
pub use matching::error::MatchingError;
pub use matching::global::match_data;
pub use matching::interpolate::interpolate_limited;
pub use matching::{MatchingConfig, DEFAULT_INTERPOLATION_LIMIT, DEFAULT_LOCATION_COLUMN};

pub use extraction::archive::{
    archive_urls_from_listing, combine_location_tables, read_first_table, source_tag,
    ArchiveTable, ExtractionConfig, LocationExtractor, TRAFFIC_LOCATIONS_2017_ARCHIVE,
};
pub use extraction::cleaning::{clean_traffic_locations, clean_traffic_locations_frame};
pub use extraction::error::ExtractionError;
pub use extraction::tabular::{parse_decimal, RawTable, TableFormat};
pub use extraction::year::year_from_filename;

pub use access::artifact::{Artifact, CACHE_EXTENSIONS};
pub use access::cache::{
    CacheKey, Clock, FrameCache, InvalidationPolicy, LoadedFrame, SystemClock,
};
pub use access::error::AccessError;
pub use access::loader::{
    air_locations_frame, prepare_traffic, read_frame, write_parquet, AIR_LOCATION_COLUMNS,
    TRAFFIC_COLUMNS,
};
pub use access::locate::{find_artifact, locate_artifact};
pub use access::DataAccess;

pub use preprocessing::air_quality::preprocess_air_quality;
pub use preprocessing::error::PreprocessError;
pub use preprocessing::grid::{flatten_grid, GridField};

pub use modeling::decompose::{seasonal_trend, WEEKLY_PERIOD};
pub use modeling::error::ModelError;
pub use modeling::forecast::{
    train_forecast, ForecastMetrics, ForecastReport, Forecaster, SeasonalTrendForecaster,
};
pub use modeling::metrics::{
    mean_absolute_error, mean_relative_difference, mean_squared_error, r2_score,
};
pub use modeling::segmentation::{
    dominant_window_size, train_segmentation, BinarySegmentation, ChangePoint,
    DetectedChangePoint, SegmentationReport, Segmenter, BOUNDARY_MARGIN_DAYS,
    DEFAULT_MAX_CHANGE_POINTS, DEFAULT_SEGMENT_LOCATION_COLUMN, DEFAULT_WINDOW_SIZE,
};
pub use modeling::series::{daily_series, DailySeries, PeriodEnd};
pub use modeling::verbosity::QuietLogs;
