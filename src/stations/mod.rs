pub mod error;
pub mod locations;
pub mod similarity;
pub mod tables;
pub mod zones;
