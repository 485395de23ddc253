//! Conversion of the raw published exports into the frames stored as artifacts.

pub mod air_quality;
pub mod error;
pub mod grid;
