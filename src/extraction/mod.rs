pub mod archive;
pub mod cleaning;
pub mod error;
pub mod tabular;
pub mod year;
