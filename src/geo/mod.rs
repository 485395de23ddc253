//! Great-circle distances, proximity weighting of traffic readings and the
//! UTM → WGS84 reprojection used when cleaning raw station coordinates.

pub mod distance;
pub mod error;
pub mod nearby;
pub mod projection;
pub mod weighting;
