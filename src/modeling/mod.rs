//! Forecasting and change-point segmentation over daily series of the matched data.
//!
//! The model-fitting libraries plug in through the [`Forecaster`](forecast::Forecaster)
//! and [`Segmenter`](segmentation::Segmenter) traits. Simple built-in models make the
//! pipeline usable on its own.

pub mod decompose;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod segmentation;
pub mod series;
pub mod verbosity;
